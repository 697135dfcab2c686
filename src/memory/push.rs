//! memory::push
//!
//! Safe publishing of a branch to its remote.
//!
//! # Checks, in order
//!
//! 1. A force push to a protected branch is refused, whatever the flags.
//! 2. A force push needs a second, explicit confirmation.
//! 3. The remote's view of the branch is fetched (best effort).
//! 4. Unless forcing, the remote tip must be an ancestor of the local tip.
//! 5. Push, setting upstream tracking when the remote has no such branch.
//!
//! Every refusal happens before anything is sent. Nothing is retried.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::types::{BranchName, Oid, RefName};
use crate::git::{CommandRunner, GitError, RefResolver};

/// Errors from [`PushGuard::safe_push`].
#[derive(Debug, Error)]
pub enum PushError {
    #[error("refusing to force-push protected branch '{branch}'")]
    ProtectedBranch { branch: String },

    #[error("force push of '{branch}' requires explicit confirmation")]
    ForceNotConfirmed { branch: String },

    #[error("remote '{remote}' is not configured")]
    NoRemote { remote: String },

    #[error("branch '{branch}' does not exist locally")]
    BranchNotFound { branch: String },

    #[error(
        "upstream changed: {remote}/{branch} is at {remote_tip}, which local {local} does not contain; pull first"
    )]
    UpstreamDiverged {
        remote: String,
        branch: String,
        local: String,
        remote_tip: String,
    },

    #[error(transparent)]
    Git(#[from] GitError),
}

impl PushError {
    /// Whether the push was refused by a safety rule rather than failing.
    pub fn is_safety_violation(&self) -> bool {
        matches!(
            self,
            PushError::ProtectedBranch { .. }
                | PushError::ForceNotConfirmed { .. }
                | PushError::UpstreamDiverged { .. }
        )
    }
}

/// Force flags for one push.
///
/// `force` alone does nothing; `explicit_force` must confirm it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    pub force: bool,
    pub explicit_force: bool,
}

impl PushOptions {
    /// A confirmed force push.
    pub fn forced() -> Self {
        Self {
            force: true,
            explicit_force: true,
        }
    }
}

/// What a successful [`PushGuard::safe_push`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    /// The remote already had the local tip.
    UpToDate { branch: BranchName, commit: Oid },
    /// The branch was sent.
    Pushed {
        branch: BranchName,
        commit: Oid,
        /// The remote had no such branch; upstream tracking was set.
        set_upstream: bool,
        forced: bool,
    },
}

/// Publishes branches to one remote.
pub struct PushGuard<'a> {
    runner: &'a CommandRunner,
    refs: RefResolver<'a>,
    remote: String,
    protected: Vec<String>,
}

impl<'a> PushGuard<'a> {
    pub fn new(runner: &'a CommandRunner, remote: impl Into<String>, protected: Vec<String>) -> Self {
        Self {
            runner,
            refs: RefResolver::new(runner),
            remote: remote.into(),
            protected,
        }
    }

    /// The remote this guard publishes to.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Check whether `branch` may never be force-pushed.
    pub fn is_protected(&self, branch: &BranchName) -> bool {
        self.protected.iter().any(|p| p == branch.as_str())
    }

    /// Refuse a force push of a protected name as the caller spelled it.
    ///
    /// Callers that rewrite names (adding the memory prefix) run this on the
    /// raw request first, so `"main"` is refused rather than quietly turned
    /// into another branch. Matching ignores ASCII case and a leading
    /// `refs/heads/`.
    pub fn check_requested(&self, requested: &str, options: PushOptions) -> Result<(), PushError> {
        if !options.force {
            return Ok(());
        }
        let name = requested.trim();
        let name = name.strip_prefix("refs/heads/").unwrap_or(name);
        if self.protected.iter().any(|p| p.eq_ignore_ascii_case(name)) {
            return Err(PushError::ProtectedBranch {
                branch: name.to_string(),
            });
        }
        Ok(())
    }

    /// Publish `branch`, refusing anything that could discard remote work.
    pub fn safe_push(
        &self,
        branch: &BranchName,
        options: PushOptions,
    ) -> Result<PushOutcome, PushError> {
        if options.force && self.is_protected(branch) {
            return Err(PushError::ProtectedBranch {
                branch: branch.to_string(),
            });
        }
        if options.force && !options.explicit_force {
            return Err(PushError::ForceNotConfirmed {
                branch: branch.to_string(),
            });
        }

        let local = self
            .refs
            .tip_commit(branch)?
            .ok_or_else(|| PushError::BranchNotFound {
                branch: branch.to_string(),
            })?;
        if !self.refs.has_remote(&self.remote)? {
            return Err(PushError::NoRemote {
                remote: self.remote.clone(),
            });
        }

        let remote_tip = self.fetch_remote_tip(branch)?;

        if let Some(remote_tip) = &remote_tip {
            if *remote_tip == local {
                debug!(branch = %branch, "remote already up to date");
                return Ok(PushOutcome::UpToDate {
                    branch: branch.clone(),
                    commit: local,
                });
            }
            if !options.force && !self.refs.is_ancestor(remote_tip, &local)? {
                return Err(PushError::UpstreamDiverged {
                    remote: self.remote.clone(),
                    branch: branch.to_string(),
                    local: local.short(7).to_string(),
                    remote_tip: remote_tip.short(7).to_string(),
                });
            }
        }

        let set_upstream = remote_tip.is_none();
        let lease = remote_tip
            .as_ref()
            .map(|tip| format!("--force-with-lease={}:{}", branch, tip));

        let mut args = vec!["push"];
        if set_upstream {
            args.push("-u");
        }
        if options.force {
            args.push(lease.as_deref().unwrap_or("--force"));
        }
        args.extend([self.remote.as_str(), branch.as_str()]);

        self.runner.run_network(&args).require("push branch")?;
        info!(branch = %branch, remote = %self.remote, commit = %local.short(7), "pushed");

        Ok(PushOutcome::Pushed {
            branch: branch.clone(),
            commit: local,
            set_upstream,
            forced: options.force,
        })
    }

    /// Fetch the remote's branch into its tracking ref and return the tip.
    ///
    /// A remote without the branch yields `None`. Any other fetch failure
    /// is logged and the existing tracking ref is used as-is.
    fn fetch_remote_tip(&self, branch: &BranchName) -> Result<Option<Oid>, PushError> {
        let tracking = RefName::for_remote_branch(&self.remote, branch);
        let refspec = format!("+{}:{}", RefName::for_branch(branch), tracking);
        let out = self
            .runner
            .run_network(&["fetch", "--no-tags", self.remote.as_str(), &refspec]);

        if !out.success {
            if out.stderr.contains("couldn't find remote ref") {
                debug!(branch = %branch, remote = %self.remote, "remote has no such branch");
                return Ok(None);
            }
            warn!(
                branch = %branch,
                remote = %self.remote,
                error = %GitError::from_output("fetch upstream", &out),
                "fetch failed, comparing against last known remote tip"
            );
        }
        Ok(self.refs.remote_tip(&self.remote, branch)?)
    }
}
