//! git::error
//!
//! Typed failures of the plumbing layer.
//!
//! Every variant that comes from a subprocess names the step that failed and
//! the command line that was attempted, so the message alone is enough to
//! reproduce the failure by hand.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::runner::{CommandOutput, RunFailure};
use crate::core::types::TypeError;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be located.
    #[error("git executable not found ({searched})")]
    GitNotFound {
        /// Where we looked
        searched: String,
    },

    /// The working directory is not inside a repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The directory that was checked
        path: PathBuf,
    },

    /// A command ran and exited unsuccessfully.
    #[error("{step} failed: `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        step: String,
        command: String,
        status: String,
        stderr: String,
    },

    /// A command exceeded its timeout and was killed.
    #[error("{step} timed out after {after:?}: `{command}`")]
    Timeout {
        step: String,
        command: String,
        after: Duration,
    },

    /// A command could not be started.
    #[error("{step} could not start `{command}`: {message}")]
    Spawn {
        step: String,
        command: String,
        message: String,
    },

    /// A command succeeded but printed something we could not interpret.
    #[error("{step} produced unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput {
        step: String,
        command: String,
        output: String,
    },

    /// Compare-and-swap precondition failed on a ref update.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        refname: String,
        expected: String,
        actual: String,
    },

    /// Blob content is not valid UTF-8.
    #[error("blob at {location} is not valid UTF-8")]
    InvalidUtf8 {
        /// `<rev>:<path>` of the blob
        location: String,
    },

    /// Scratch file handling failed.
    #[error("failed to prepare {what}: {source}")]
    Io {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl GitError {
    /// Build the error describing a failed [`CommandOutput`].
    pub fn from_output(step: &str, output: &CommandOutput) -> Self {
        let command = output.command.clone();
        match &output.failure {
            Some(RunFailure::ExecutableNotFound) => GitError::GitNotFound {
                searched: command,
            },
            Some(RunFailure::Timeout(after)) => GitError::Timeout {
                step: step.to_string(),
                command,
                after: *after,
            },
            Some(RunFailure::Spawn(message)) => GitError::Spawn {
                step: step.to_string(),
                command,
                message: message.clone(),
            },
            Some(RunFailure::Exit(code)) => GitError::CommandFailed {
                step: step.to_string(),
                command,
                status: code
                    .map(|c| format!("status {}", c))
                    .unwrap_or_else(|| "a signal".to_string()),
                stderr: output.stderr.trim().to_string(),
            },
            None => GitError::UnexpectedOutput {
                step: step.to_string(),
                command,
                output: output.stdout_lossy().into_owned(),
            },
        }
    }

    /// Whether retrying the whole operation may succeed.
    ///
    /// Timeouts and spawn failures are environmental; everything else is a
    /// property of the repository or the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, GitError::Timeout { .. } | GitError::Spawn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(failure: Option<RunFailure>) -> CommandOutput {
        CommandOutput {
            command: "git write-tree".to_string(),
            success: failure.is_none(),
            stdout: b"garbage".to_vec(),
            stderr: "fatal: something broke\n".to_string(),
            failure,
        }
    }

    #[test]
    fn exit_failure_names_step_and_command() {
        let err = GitError::from_output("write tree", &output(Some(RunFailure::Exit(Some(128)))));
        let msg = err.to_string();
        assert!(msg.contains("write tree"));
        assert!(msg.contains("git write-tree"));
        assert!(msg.contains("status 128"));
        assert!(msg.contains("fatal: something broke"));
        assert!(!err.is_transient());
    }

    #[test]
    fn timeout_is_transient() {
        let err = GitError::from_output(
            "fetch",
            &output(Some(RunFailure::Timeout(Duration::from_secs(2)))),
        );
        assert!(matches!(err, GitError::Timeout { .. }));
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn spawn_is_transient() {
        let err = GitError::from_output("push", &output(Some(RunFailure::Spawn("EAGAIN".into()))));
        assert!(err.is_transient());
    }

    #[test]
    fn missing_executable() {
        let err = GitError::from_output("any", &output(Some(RunFailure::ExecutableNotFound)));
        assert!(matches!(err, GitError::GitNotFound { .. }));
    }

    #[test]
    fn success_means_unexpected_output() {
        let err = GitError::from_output("mktree", &output(None));
        assert!(matches!(err, GitError::UnexpectedOutput { .. }));
        assert!(err.to_string().contains("garbage"));
    }

    #[test]
    fn cas_display() {
        let err = GitError::CasFailed {
            refname: "refs/heads/memory/main".into(),
            expected: "abc".into(),
            actual: "def".into(),
        };
        assert!(err.to_string().contains("CAS failed"));
        assert!(err.to_string().contains("refs/heads/memory/main"));
    }
}
