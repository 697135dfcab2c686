//! memory::store
//!
//! The isolated commit protocol for memory branches.
//!
//! # Commit protocol
//!
//! 1. Snapshot HEAD (branch and commit) for the canary in step 10.
//! 2. Seed the branch if absent: a parentless commit over the empty tree,
//!    created with a create-only ref update.
//! 3. Refuse a path that clashes with an existing file or directory, then
//!    write the content blob.
//! 4. Read the branch tip; its tree is the base tree.
//! 5. Build the new tree in a scratch index.
//! 6. Re-read the tip; it becomes the parent.
//! 7. Write the commit.
//! 8. Move the ref according to the [`RefUpdatePolicy`].
//! 9. Publish through the optional [`PushGuard`]; failure is recorded in the
//!    receipt, never raised.
//! 10. Compare the checked-out branch with the snapshot. A different
//!     branch is [`StoreError::HeadMoved`]; a new commit on the same branch
//!     is only logged.
//!
//! # Concurrency
//!
//! Under [`RefUpdatePolicy::LastWriterWins`] step 8 is unconditional: two
//! writers that read the same tip both succeed and the later ref write
//! orphans the earlier commit. Under [`RefUpdatePolicy::CompareAndSwap`]
//! step 8 only succeeds if the tip still equals the parent from step 6;
//! otherwise steps 4-8 are repeated, up to `max_attempts` times.
//!
//! Objects written by an abandoned attempt stay unreferenced in the object
//! store. Nothing here deletes objects.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::push::{PushGuard, PushOptions};
use crate::core::config::{RefUpdateMode, Settings};
use crate::core::naming::ContentPath;
use crate::core::types::{BranchName, Oid, RefName};
use crate::git::{
    CommandRunner, GitError, HeadSnapshot, LogEntry, ObjectWriter, RefExpectation, RefResolver,
};

/// Message of the parentless commit that starts every memory branch.
pub const SEED_MESSAGE: &str = "initialize memory branch";

/// Errors from [`MemoryBranchStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The checked-out branch changed while the operation ran.
    #[error("HEAD moved during {operation}: was {before}, now {after}")]
    HeadMoved {
        operation: &'static str,
        before: HeadSnapshot,
        after: HeadSnapshot,
    },

    /// Compare-and-swap kept losing to other writers.
    #[error("branch '{branch}' kept moving; gave up after {attempts} attempts")]
    Contended { branch: String, attempts: u32 },

    /// `path` would turn a file into a directory or the reverse.
    #[error("cannot write '{path}' on '{branch}': {existing} already exists")]
    PathConflict {
        branch: String,
        path: String,
        existing: String,
    },

    /// The branch was deleted between seeding and committing.
    #[error("branch '{branch}' disappeared during commit")]
    BranchVanished { branch: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

/// How step 8 moves the branch ref.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefUpdatePolicy {
    /// Unconditional write.
    #[default]
    LastWriterWins,
    /// Write only if the tip is still the parent; retry otherwise.
    CompareAndSwap { max_attempts: u32 },
}

impl RefUpdatePolicy {
    /// Policy described by resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.ref_update {
            RefUpdateMode::LastWriterWins => RefUpdatePolicy::LastWriterWins,
            RefUpdateMode::CompareAndSwap => RefUpdatePolicy::CompareAndSwap {
                max_attempts: settings.cas_attempts.max(1),
            },
        }
    }

    fn attempts(&self) -> u32 {
        match self {
            RefUpdatePolicy::LastWriterWins => 1,
            RefUpdatePolicy::CompareAndSwap { max_attempts } => (*max_attempts).max(1),
        }
    }
}

/// Result of step 9.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PublishStatus {
    /// No publish was requested.
    Skipped,
    Published,
    /// The local commit stands; only the push failed.
    Failed(String),
}

/// Everything a successful commit produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub branch: BranchName,
    pub path: String,
    pub commit: Oid,
    pub parent: Oid,
    pub tree: Oid,
    pub blob: Oid,
    /// The branch was seeded by this call.
    pub created_branch: bool,
    pub publish: PublishStatus,
}

/// One commit of a memory branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryCommit {
    pub oid: Oid,
    pub parents: Vec<Oid>,
    pub summary: String,
}

impl From<LogEntry> for MemoryCommit {
    fn from(entry: LogEntry) -> Self {
        Self {
            oid: entry.oid,
            parents: entry.parents,
            summary: entry.summary,
        }
    }
}

/// Orchestrates [`ObjectWriter`] and [`RefResolver`] for memory branches.
pub struct MemoryBranchStore<'a> {
    objects: ObjectWriter<'a>,
    refs: RefResolver<'a>,
    clock: &'a dyn Clock,
    policy: RefUpdatePolicy,
    publisher: Option<&'a PushGuard<'a>>,
}

impl<'a> MemoryBranchStore<'a> {
    pub fn new(runner: &'a CommandRunner, clock: &'a dyn Clock) -> Self {
        Self {
            objects: ObjectWriter::new(runner),
            refs: RefResolver::new(runner),
            clock,
            policy: RefUpdatePolicy::default(),
            publisher: None,
        }
    }

    /// Set the ref update policy.
    pub fn with_policy(mut self, policy: RefUpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Publish every successful commit through `guard`.
    pub fn with_publisher(mut self, guard: &'a PushGuard<'a>) -> Self {
        self.publisher = Some(guard);
        self
    }

    /// Write `content` at `path` on `branch` as one new commit.
    pub fn commit(
        &self,
        content: &[u8],
        path: &ContentPath,
        branch: &BranchName,
        message: &str,
    ) -> Result<CommitReceipt, StoreError> {
        self.with_head_canary("commit", || {
            let created_branch = self.ensure_branch(branch)?;
            let rev = RefName::for_branch(branch);
            if let Some(existing) = self.objects.path_conflict(rev.as_str(), path)? {
                return Err(StoreError::PathConflict {
                    branch: branch.to_string(),
                    path: path.to_string(),
                    existing,
                });
            }
            let blob = self.objects.write_blob(content)?;
            let (commit, parent, tree) = self.append(branch, path, &blob, message)?;
            info!(
                branch = %branch,
                namespace = path.namespace(),
                path = %path,
                commit = %commit.short(7),
                "memory committed"
            );

            let publish = self.publish(branch);
            Ok(CommitReceipt {
                branch: branch.clone(),
                path: path.to_string(),
                commit,
                parent,
                tree,
                blob,
                created_branch,
                publish,
            })
        })
    }

    /// Content at `path` on `branch`, `None` if either is absent.
    pub fn read(&self, path: &ContentPath, branch: &BranchName) -> Result<Option<String>, StoreError> {
        self.with_head_canary("read", || {
            if !self.refs.branch_exists(branch)? {
                debug!(branch = %branch, "read from absent branch");
                return Ok(None);
            }
            let rev = RefName::for_branch(branch);
            Ok(self.objects.read_text_at(rev.as_str(), path)?)
        })
    }

    /// Memory branches under `prefix`, local and remote, sorted and deduplicated.
    ///
    /// With `live_remote`, the remote is also asked directly; an unreachable
    /// remote is skipped.
    pub fn list_branches(
        &self,
        prefix: &str,
        live_remote: Option<&str>,
    ) -> Result<Vec<BranchName>, StoreError> {
        let mut names: BTreeSet<BranchName> = self.refs.local_branches(prefix)?.into_iter().collect();
        names.extend(
            self.refs
                .remote_tracking_branches(prefix)?
                .into_iter()
                .map(|(_, branch)| branch),
        );

        if let Some(remote) = live_remote {
            if self.refs.has_remote(remote)? {
                match self.refs.remote_heads(remote, prefix) {
                    Ok(heads) => names.extend(heads.iter().filter_map(|entry| {
                        entry
                            .name
                            .strip_prefix("refs/heads/")
                            .and_then(|name| BranchName::new(name).ok())
                    })),
                    Err(err) => debug!(remote, error = %err, "remote listing skipped"),
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Every blob path on `branch`, empty if the branch is absent.
    pub fn list_paths(&self, branch: &BranchName) -> Result<Vec<String>, StoreError> {
        if !self.refs.branch_exists(branch)? {
            return Ok(Vec::new());
        }
        let rev = RefName::for_branch(branch);
        Ok(self
            .objects
            .list_tree(rev.as_str())?
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }

    /// Newest-first commits of `branch`.
    pub fn history(&self, branch: &BranchName, limit: usize) -> Result<Vec<MemoryCommit>, StoreError> {
        Ok(self
            .refs
            .history(branch, limit)?
            .into_iter()
            .map(MemoryCommit::from)
            .collect())
    }

    /// Seed `branch` with a parentless empty-tree commit if it is absent.
    ///
    /// Returns whether this call created it. Losing the creation race to
    /// another writer is not an error.
    fn ensure_branch(&self, branch: &BranchName) -> Result<bool, StoreError> {
        if self.refs.branch_exists(branch)? {
            return Ok(false);
        }

        let empty = self.objects.empty_tree()?;
        let seed = self
            .objects
            .write_commit(&empty, None, SEED_MESSAGE, self.clock.now())?;
        let refname = RefName::for_branch(branch);

        match self
            .refs
            .update_ref(&refname, &seed, RefExpectation::Absent, SEED_MESSAGE)
        {
            Ok(()) => {
                info!(branch = %branch, commit = %seed.short(7), "memory branch created");
                Ok(true)
            }
            Err(GitError::CasFailed { actual, .. }) => {
                debug!(branch = %branch, %actual, "branch seeded concurrently");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Steps 4-8. Returns `(commit, parent, tree)`.
    fn append(
        &self,
        branch: &BranchName,
        path: &ContentPath,
        blob: &Oid,
        message: &str,
    ) -> Result<(Oid, Oid, Oid), StoreError> {
        let refname = RefName::for_branch(branch);
        let attempts = self.policy.attempts();

        for attempt in 1..=attempts {
            let base = self.refs.tip_commit(branch)?;
            let tree = self.objects.build_tree(base.as_ref(), path, blob)?;

            let parent = self
                .refs
                .tip_commit(branch)?
                .ok_or_else(|| StoreError::BranchVanished {
                    branch: branch.to_string(),
                })?;

            if let RefUpdatePolicy::CompareAndSwap { .. } = self.policy {
                if base.as_ref() != Some(&parent) {
                    debug!(branch = %branch, attempt, "tip moved while building tree");
                    continue;
                }
            }

            let commit = self
                .objects
                .write_commit(&tree, Some(&parent), message, self.clock.now())?;

            let expected = match self.policy {
                RefUpdatePolicy::LastWriterWins => RefExpectation::Any,
                RefUpdatePolicy::CompareAndSwap { .. } => RefExpectation::Value(&parent),
            };
            match self.refs.update_ref(&refname, &commit, expected, message) {
                Ok(()) => return Ok((commit, parent, tree)),
                Err(GitError::CasFailed { actual, .. }) => {
                    debug!(branch = %branch, attempt, %actual, "lost ref update race");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(branch = %branch, attempts, "giving up on contended branch");
        Err(StoreError::Contended {
            branch: branch.to_string(),
            attempts,
        })
    }

    fn publish(&self, branch: &BranchName) -> PublishStatus {
        let Some(guard) = self.publisher else {
            return PublishStatus::Skipped;
        };
        match guard.safe_push(branch, PushOptions::default()) {
            Ok(_) => PublishStatus::Published,
            Err(err) => {
                warn!(branch = %branch, remote = guard.remote(), error = %err, "publish failed; local commit kept");
                PublishStatus::Failed(err.to_string())
            }
        }
    }

    /// Run `op` between two HEAD snapshots.
    ///
    /// Switching the checked-out branch (or detaching HEAD) outranks
    /// whatever `op` returned. A new commit on the same branch is the
    /// caller's own work and is only logged.
    fn with_head_canary<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let before = self.refs.head_snapshot()?;
        let result = op();
        let after = self.refs.head_snapshot()?;

        if before.branch == after.branch {
            if before.commit != after.commit {
                warn!(
                    operation,
                    before = %before,
                    after = %after,
                    "current branch advanced during a memory operation"
                );
            }
        } else {
            error!(
                operation,
                before = %before,
                after = %after,
                "checked-out branch changed during a memory operation"
            );
            return Err(StoreError::HeadMoved {
                operation,
                before,
                after,
            });
        }
        result
    }
}
