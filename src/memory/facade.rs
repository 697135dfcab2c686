//! memory::facade
//!
//! The entry point other code should depend on.
//!
//! # Two surfaces
//!
//! - `persist`, `read`, `list_branches`, `push` answer with `bool`,
//!   `Option` and `Vec`. Failures are logged and never escape.
//! - The `try_*` methods return the same results as `Result`, with the
//!   failing step and command in the error, for callers that want to report
//!   or retry.
//!
//! Inputs are sanitized here: content paths, branch names and namespaces
//! are canonicalized before any object is written.
//!
//! # Example
//!
//! ```no_run
//! use membranch::memory::MemoryFacade;
//!
//! let memory = MemoryFacade::open("/path/to/repo").unwrap();
//! assert!(memory.persist("hello", "agents/a1/note.md", None, Some("note")));
//! assert_eq!(
//!     memory.read("agents/a1/note.md", None).as_deref(),
//!     Some("hello")
//! );
//! ```

use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use thiserror::Error;
use tracing::{debug, warn};

use super::clock::{clock_from_env, Clock};
use super::push::{PushError, PushGuard, PushOptions, PushOutcome};
use super::store::{
    CommitReceipt, MemoryBranchStore, MemoryCommit, RefUpdatePolicy, StoreError,
};
use crate::core::config::{Config, ConfigError, Settings};
use crate::core::naming::{namespaced_path, sanitize_branch, ContentPath, NamingError};
use crate::core::types::BranchName;
use crate::git::{CommandRunner, GitError, RefResolver, RepoContext};

/// Any failure surfaced by the `try_*` methods.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Push(#[from] PushError),
}

impl MemoryError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MemoryError::Git(err) | MemoryError::Store(StoreError::Git(err)) => err.is_transient(),
            MemoryError::Push(PushError::Git(err)) => err.is_transient(),
            MemoryError::Store(StoreError::Contended { .. }) => true,
            _ => false,
        }
    }

    /// Whether a push was refused by a safety rule before anything was sent.
    pub fn is_safety_violation(&self) -> bool {
        matches!(self, MemoryError::Push(err) if err.is_safety_violation())
    }
}

/// Build the runner context for `work_dir` from resolved settings.
fn repo_context(work_dir: &Path, settings: &Settings) -> RepoContext {
    let mut ctx = RepoContext::new(work_dir)
        .with_timeout(settings.timeout)
        .with_network_timeout(settings.network_timeout);
    if let Some(git) = &settings.git_path {
        ctx = ctx.with_git_path(git);
    }
    if let Some(name) = &settings.identity.name {
        ctx = ctx
            .with_env("GIT_AUTHOR_NAME", name)
            .with_env("GIT_COMMITTER_NAME", name);
    }
    if let Some(email) = &settings.identity.email {
        ctx = ctx
            .with_env("GIT_AUTHOR_EMAIL", email)
            .with_env("GIT_COMMITTER_EMAIL", email);
    }
    ctx
}

/// Memory branches of one repository.
pub struct MemoryFacade {
    runner: CommandRunner,
    settings: Settings,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for MemoryFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFacade")
            .field("runner", &self.runner)
            .field("settings", &self.settings)
            .finish()
    }
}

impl MemoryFacade {
    /// Open the repository containing `work_dir` with configuration loaded
    /// from the standard locations.
    pub fn open(work_dir: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let work_dir = work_dir.into();

        // The global file may name the git executable needed to find the
        // repository's own config.
        let global = Config::load(None)?.settings()?;
        let bootstrap = CommandRunner::new(repo_context(&work_dir, &global))?;
        let git_dir = RefResolver::new(&bootstrap).git_dir()?;

        let config = Config::load(Some(&git_dir))?;
        debug!(
            global = ?config.global_config_loaded_from(),
            repo = ?config.repo_config_loaded_from(),
            "configuration loaded"
        );
        Self::with_settings(work_dir, config.settings()?, clock_from_env())
    }

    /// Build a facade from explicit settings and clock.
    pub fn with_settings(
        work_dir: impl Into<PathBuf>,
        settings: Settings,
        clock: Box<dyn Clock>,
    ) -> Result<Self, MemoryError> {
        let work_dir = work_dir.into();
        let runner = CommandRunner::new(repo_context(&work_dir, &settings))?;
        Ok(Self {
            runner,
            settings,
            clock,
        })
    }

    /// Publish after every successful persist.
    pub fn with_auto_push(mut self, enabled: bool) -> Self {
        self.settings.auto_push = enabled;
        self
    }

    /// The settings in effect.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Canonical branch for `branch`, or the default branch.
    pub fn resolve_branch(&self, branch: Option<&str>) -> Result<BranchName, MemoryError> {
        match branch {
            Some(raw) => Ok(sanitize_branch(raw, &self.settings.branch_prefix)?),
            None => Ok(self.settings.default_branch.clone()),
        }
    }

    /// Content path `<namespace>/<name>`.
    pub fn namespaced_path(&self, namespace: &str, name: &str) -> Result<ContentPath, MemoryError> {
        Ok(namespaced_path(namespace, name)?)
    }

    fn store(&self) -> MemoryBranchStore<'_> {
        MemoryBranchStore::new(&self.runner, self.clock.as_ref())
            .with_policy(RefUpdatePolicy::from_settings(&self.settings))
    }

    fn push_guard(&self) -> PushGuard<'_> {
        PushGuard::new(
            &self.runner,
            self.settings.remote.as_str(),
            self.settings.protected_branches.clone(),
        )
    }

    fn default_message(&self, path: &ContentPath) -> String {
        format!(
            "memory: update {} ({})",
            path,
            self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// Persist `content` at `path`, returning whether the commit landed.
    pub fn persist(
        &self,
        content: &str,
        path: &str,
        branch: Option<&str>,
        message: Option<&str>,
    ) -> bool {
        match self.try_persist(content, path, branch, message) {
            Ok(_) => true,
            Err(err) => {
                warn!(path, error = %err, "persist failed");
                false
            }
        }
    }

    /// Persist `content` at `path` and describe what was written.
    pub fn try_persist(
        &self,
        content: &str,
        path: &str,
        branch: Option<&str>,
        message: Option<&str>,
    ) -> Result<CommitReceipt, MemoryError> {
        let path = ContentPath::parse(path)?;
        self.persist_at(content.as_bytes(), &path, branch, message)
    }

    /// Persist raw bytes at an already sanitized path.
    pub fn persist_at(
        &self,
        content: &[u8],
        path: &ContentPath,
        branch: Option<&str>,
        message: Option<&str>,
    ) -> Result<CommitReceipt, MemoryError> {
        let branch = self.resolve_branch(branch)?;
        let message = match message.map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => self.default_message(path),
        };

        let guard = self.push_guard();
        let mut store = self.store();
        if self.settings.auto_push {
            store = store.with_publisher(&guard);
        }
        Ok(store.commit(content, path, &branch, &message)?)
    }

    /// Content at `path`, or `None` when absent or unreadable.
    pub fn read(&self, path: &str, branch: Option<&str>) -> Option<String> {
        match self.try_read(path, branch) {
            Ok(content) => content,
            Err(err) => {
                warn!(path, error = %err, "read failed");
                None
            }
        }
    }

    /// Content at `path`; `Ok(None)` when the branch or path is absent.
    pub fn try_read(&self, path: &str, branch: Option<&str>) -> Result<Option<String>, MemoryError> {
        let path = ContentPath::parse(path)?;
        let branch = self.resolve_branch(branch)?;
        Ok(self.store().read(&path, &branch)?)
    }

    /// Memory branch names, empty on failure.
    pub fn list_branches(&self) -> Vec<String> {
        self.try_list_branches().unwrap_or_else(|err| {
            warn!(error = %err, "listing branches failed");
            Vec::new()
        })
    }

    /// Memory branch names, local and remote, sorted and deduplicated.
    pub fn try_list_branches(&self) -> Result<Vec<String>, MemoryError> {
        let live_remote = self
            .settings
            .list_remote
            .then_some(self.settings.remote.as_str());
        Ok(self
            .store()
            .list_branches(&self.settings.branch_prefix, live_remote)?
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// Every content path on `branch`.
    pub fn list_paths(&self, branch: Option<&str>) -> Result<Vec<String>, MemoryError> {
        let branch = self.resolve_branch(branch)?;
        Ok(self.store().list_paths(&branch)?)
    }

    /// Newest-first commits on `branch`, at most `limit`.
    pub fn history(&self, branch: Option<&str>, limit: usize) -> Result<Vec<MemoryCommit>, MemoryError> {
        let branch = self.resolve_branch(branch)?;
        Ok(self.store().history(&branch, limit)?)
    }

    /// Publish `branch`, returning whether it succeeded.
    pub fn push(&self, branch: Option<&str>, options: PushOptions) -> bool {
        match self.try_push(branch, options) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "push failed");
                false
            }
        }
    }

    /// Publish `branch` through the safety checks.
    pub fn try_push(
        &self,
        branch: Option<&str>,
        options: PushOptions,
    ) -> Result<PushOutcome, MemoryError> {
        let guard = self.push_guard();
        if let Some(requested) = branch {
            guard.check_requested(requested, options)?;
        }
        let branch = self.resolve_branch(branch)?;
        Ok(guard.safe_push(&branch, options)?)
    }
}
