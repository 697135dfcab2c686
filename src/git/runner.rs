//! git::runner
//!
//! Execution of git subcommands against one repository.
//!
//! # Contract
//!
//! [`CommandRunner::run`] never fails: every outcome, including a missing
//! executable or a timeout, comes back as a [`CommandOutput`] whose `success`
//! flag and `failure` field say what happened. Callers that want a `Result`
//! use [`CommandOutput::require`].
//!
//! # Timeouts
//!
//! Each invocation is bounded. The child is spawned on a private
//! current-thread tokio runtime and killed when its deadline passes, so a
//! hung fetch cannot hang the caller. Because of that runtime, the runner
//! must not be called from inside another tokio runtime's worker thread.
//!
//! # Environment
//!
//! Every command runs with `GIT_TERMINAL_PROMPT=0` (no credential prompts on
//! a network step) and `LC_ALL=C` (stable stderr wording).

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

use super::error::GitError;

/// Default bound for local plumbing commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Repository handle passed explicitly to the runner.
///
/// This replaces any notion of an ambient "current repository": whoever
/// builds the runner decides which directory and which timeouts it uses.
#[derive(Debug, Clone)]
pub struct RepoContext {
    /// Directory commands run in (any directory inside the repository).
    pub work_dir: PathBuf,
    /// Bound for local commands.
    pub timeout: Duration,
    /// Bound for fetch, push and ls-remote.
    pub network_timeout: Duration,
    /// Explicit executable; `None` searches `PATH` for `git`.
    pub git_path: Option<PathBuf>,
    /// Extra environment applied to every command (commit identity).
    pub env: Vec<(String, String)>,
}

impl RepoContext {
    /// Context with default timeouts for `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout: DEFAULT_TIMEOUT,
            network_timeout: DEFAULT_TIMEOUT,
            git_path: None,
            env: Vec::new(),
        }
    }

    /// Set the local command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the network command timeout.
    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    /// Use an explicit executable instead of searching `PATH`.
    pub fn with_git_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.git_path = Some(path.into());
        self
    }

    /// Add an environment variable to every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Why a command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    /// No executable could be resolved.
    ExecutableNotFound,
    /// The process could not be started.
    Spawn(String),
    /// The deadline passed; the process was killed.
    Timeout(Duration),
    /// Non-zero exit; `None` when terminated by a signal.
    Exit(Option<i32>),
}

/// Captured result of one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Rendered command line, e.g. `git update-ref refs/heads/memory/main ...`.
    pub command: String,
    /// True only for a zero exit status.
    pub success: bool,
    /// Raw standard output.
    pub stdout: Vec<u8>,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Set whenever `success` is false.
    pub failure: Option<RunFailure>,
}

impl CommandOutput {
    fn failed(command: String, failure: RunFailure) -> Self {
        Self {
            command,
            success: false,
            stdout: Vec::new(),
            stderr: String::new(),
            failure: Some(failure),
        }
    }

    /// Standard output as text.
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Exit code, if the process ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match &self.failure {
            None => Some(0),
            Some(RunFailure::Exit(code)) => *code,
            Some(_) => None,
        }
    }

    /// True when the process ran and reported a plain negative answer
    /// (exit 1 for `rev-parse --verify -q`, `merge-base --is-ancestor`, ...).
    pub fn is_negative_answer(&self) -> bool {
        self.exit_code() == Some(1)
    }

    /// True when the process ran to completion, whatever its exit status.
    pub fn completed(&self) -> bool {
        matches!(self.failure, None | Some(RunFailure::Exit(_)))
    }

    /// Convert into a `Result`, yielding trimmed stdout on success.
    pub fn require(self, step: &str) -> Result<String, GitError> {
        if self.success {
            Ok(self.stdout_lossy().trim().to_string())
        } else {
            Err(GitError::from_output(step, &self))
        }
    }
}

/// Render a command line for diagnostics, quoting arguments with spaces.
fn render_command(args: &[&str]) -> String {
    let mut rendered = String::from("git");
    for arg in args {
        rendered.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('\'') {
            rendered.push('\'');
            rendered.push_str(&arg.replace('\'', "'\\''"));
            rendered.push('\'');
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}

/// Find the git executable: an explicit path if given, else `git` on `PATH`.
fn resolve_executable(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    let names: &[&str] = if cfg!(windows) {
        &["git.exe", "git"]
    } else {
        &["git"]
    };
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Runs git subcommands for one [`RepoContext`].
pub struct CommandRunner {
    ctx: RepoContext,
    program: OnceLock<Option<PathBuf>>,
    runtime: tokio::runtime::Runtime,
}

impl std::fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("work_dir", &self.ctx.work_dir)
            .field("timeout", &self.ctx.timeout)
            .finish()
    }
}

impl CommandRunner {
    /// Create a runner for the given context.
    ///
    /// # Errors
    ///
    /// Fails only if the private runtime used for timeouts cannot be built.
    pub fn new(ctx: RepoContext) -> Result<Self, GitError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(|source| GitError::Io {
                what: "command runtime".to_string(),
                source,
            })?;

        Ok(Self {
            ctx,
            program: OnceLock::new(),
            runtime,
        })
    }

    /// The context this runner was built with.
    pub fn context(&self) -> &RepoContext {
        &self.ctx
    }

    /// Resolved executable, looked up on first use and cached.
    pub fn program(&self) -> Option<&Path> {
        self.program
            .get_or_init(|| resolve_executable(self.ctx.git_path.as_deref()))
            .as_deref()
    }

    /// Run with the local timeout and no extra environment.
    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.run_with(args, &[], self.ctx.timeout)
    }

    /// Run with the network timeout.
    pub fn run_network(&self, args: &[&str]) -> CommandOutput {
        self.run_with(args, &[], self.ctx.network_timeout)
    }

    /// Run with extra environment variables and an explicit timeout.
    pub fn run_with(&self, args: &[&str], env: &[(&str, &str)], timeout: Duration) -> CommandOutput {
        let command = render_command(args);
        let Some(program) = self.program() else {
            return CommandOutput::failed(command, RunFailure::ExecutableNotFound);
        };

        debug!(%command, "running");

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(&self.ctx.work_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .envs(self.ctx.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, cmd.output()).await });

        match result {
            Err(_elapsed) => {
                debug!(%command, ?timeout, "timed out");
                CommandOutput::failed(command, RunFailure::Timeout(timeout))
            }
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                CommandOutput::failed(command, RunFailure::ExecutableNotFound)
            }
            Ok(Err(err)) => CommandOutput::failed(command, RunFailure::Spawn(err.to_string())),
            Ok(Ok(output)) => {
                let success = output.status.success();
                let failure = (!success).then(|| RunFailure::Exit(output.status.code()));
                CommandOutput {
                    command,
                    success,
                    stdout: output.stdout,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    failure,
                }
            }
        }
    }
}
