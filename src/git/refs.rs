//! git::refs
//!
//! Reading and moving refs.
//!
//! # Ref updates
//!
//! [`RefResolver::update_ref`] is the only call in the crate that moves a
//! branch pointer. The expected old value is optional: memory branches
//! default to an unconditional write (last writer wins), while creation and
//! the compare-and-swap policy pass an expectation that `git update-ref`
//! enforces atomically.
//!
//! # Absence
//!
//! Missing branches and unresolvable revisions are `Ok(None)`, never errors.
//! Errors are reserved for commands that could not run or answered with
//! something other than yes/no.

use std::path::PathBuf;

use tracing::debug;

use super::error::GitError;
use super::runner::CommandRunner;
use crate::core::types::{BranchName, Oid, RefName};

/// Precondition for [`RefResolver::update_ref`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefExpectation<'o> {
    /// Write unconditionally.
    Any,
    /// The ref must not exist yet.
    Absent,
    /// The ref must currently point at this commit.
    Value(&'o Oid),
}

impl RefExpectation<'_> {
    fn describe(&self) -> String {
        match self {
            RefExpectation::Any => "<any>".to_string(),
            RefExpectation::Absent => "<none>".to_string(),
            RefExpectation::Value(oid) => oid.to_string(),
        }
    }
}

/// Where HEAD pointed at one moment.
///
/// Compared before and after an operation to prove the caller's checkout was
/// left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadSnapshot {
    /// Short branch name, `None` when detached.
    pub branch: Option<String>,
    /// Commit HEAD resolves to, `None` on an unborn branch.
    pub commit: Option<Oid>,
}

impl std::fmt::Display for HeadSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let branch = self.branch.as_deref().unwrap_or("(detached)");
        match &self.commit {
            Some(oid) => write!(f, "{} at {}", branch, oid.short(7)),
            None => write!(f, "{} (unborn)", branch),
        }
    }
}

/// A ref with its name and target commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The commit the ref points to
    pub oid: Oid,
}

/// One commit of a branch's first-parent history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub oid: Oid,
    pub parents: Vec<Oid>,
    pub summary: String,
}

/// Reads and writes refs through the command runner.
pub struct RefResolver<'a> {
    runner: &'a CommandRunner,
}

impl<'a> RefResolver<'a> {
    /// Create a resolver using the given runner.
    pub fn new(runner: &'a CommandRunner) -> Self {
        Self { runner }
    }

    /// Absolute path of the repository's git directory.
    ///
    /// # Errors
    ///
    /// [`GitError::NotARepo`] when the working directory is outside any
    /// repository.
    pub fn git_dir(&self) -> Result<PathBuf, GitError> {
        let out = self.runner.run(&["rev-parse", "--absolute-git-dir"]);
        if out.success {
            return Ok(PathBuf::from(out.require("locate git directory")?));
        }
        if out.exit_code() == Some(128) {
            return Err(GitError::NotARepo {
                path: self.runner.context().work_dir.clone(),
            });
        }
        Err(GitError::from_output("locate git directory", &out))
    }

    /// Short name of the checked-out branch, `None` when HEAD is detached.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        let out = self.runner.run(&["symbolic-ref", "-q", "--short", "HEAD"]);
        if out.success {
            return Ok(Some(out.require("read current branch")?));
        }
        if out.is_negative_answer() {
            return Ok(None);
        }
        Err(GitError::from_output("read current branch", &out))
    }

    /// Branch and commit HEAD points at right now.
    pub fn head_snapshot(&self) -> Result<HeadSnapshot, GitError> {
        Ok(HeadSnapshot {
            branch: self.current_branch()?,
            commit: self.resolve_commit("HEAD")?,
        })
    }

    /// Resolve any revision to a commit id.
    pub fn resolve_commit(&self, rev: &str) -> Result<Option<Oid>, GitError> {
        let spec = format!("{}^{{commit}}", rev);
        let out = self.runner.run(&["rev-parse", "--verify", "-q", &spec]);
        if out.success {
            return Ok(Some(Oid::new(out.require("resolve commit")?)?));
        }
        if out.is_negative_answer() {
            return Ok(None);
        }
        Err(GitError::from_output("resolve commit", &out))
    }

    /// Tip commit of a local branch, `None` if the branch does not exist.
    pub fn tip_commit(&self, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        self.resolve_commit(RefName::for_branch(branch).as_str())
    }

    /// Check whether a local branch exists.
    pub fn branch_exists(&self, branch: &BranchName) -> Result<bool, GitError> {
        Ok(self.tip_commit(branch)?.is_some())
    }

    /// Tip of `refs/remotes/<remote>/<branch>` as of the last fetch.
    pub fn remote_tip(&self, remote: &str, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        self.resolve_commit(RefName::for_remote_branch(remote, branch).as_str())
    }

    /// Point `refname` at `new`, subject to `expected`.
    ///
    /// # Errors
    ///
    /// [`GitError::CasFailed`] when an expectation was given and the ref
    /// held something else; other failures as [`GitError::CommandFailed`].
    pub fn update_ref(
        &self,
        refname: &RefName,
        new: &Oid,
        expected: RefExpectation<'_>,
        message: &str,
    ) -> Result<(), GitError> {
        let mut args = vec!["update-ref", "-m", message, refname.as_str(), new.as_str()];
        match expected {
            RefExpectation::Any => {}
            RefExpectation::Absent => args.push(""),
            RefExpectation::Value(old) => args.push(old.as_str()),
        }

        let out = self.runner.run(&args);
        if out.success {
            debug!(refname = %refname, new = %new.short(7), "ref updated");
            return Ok(());
        }

        if expected != RefExpectation::Any && out.completed() {
            let actual = self.resolve_commit(refname.as_str())?;
            let held = match (&expected, &actual) {
                (RefExpectation::Absent, None) => true,
                (RefExpectation::Value(old), Some(actual)) => *old == actual,
                _ => false,
            };
            if !held {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected.describe(),
                    actual: actual
                        .map(|oid| oid.to_string())
                        .unwrap_or_else(|| "<none>".to_string()),
                });
            }
        }
        Err(GitError::from_output("update ref", &out))
    }

    /// Whether `ancestor` is reachable from `descendant`.
    ///
    /// A commit is its own ancestor.
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        let out = self.runner.run(&[
            "merge-base",
            "--is-ancestor",
            ancestor.as_str(),
            descendant.as_str(),
        ]);
        if out.success {
            Ok(true)
        } else if out.is_negative_answer() {
            Ok(false)
        } else {
            Err(GitError::from_output("check ancestry", &out))
        }
    }

    /// Every ref under `namespace` (e.g. `refs/heads/`) with its commit.
    pub fn list_refs(&self, namespace: &str) -> Result<Vec<RefEntry>, GitError> {
        let out = self.runner.run(&[
            "for-each-ref",
            "--format=%(objectname) %(refname)",
            namespace,
        ]);
        let listing = out.require("list refs")?;

        let mut entries = Vec::new();
        for line in listing.lines() {
            let Some((oid, name)) = line.split_once(' ') else {
                continue;
            };
            // Symbolic refs such as refs/remotes/origin/HEAD fail validation
            // or duplicate a real branch; skip them.
            if name.ends_with("/HEAD") {
                continue;
            }
            let (Ok(oid), Ok(name)) = (Oid::new(oid), RefName::new(name)) else {
                continue;
            };
            entries.push(RefEntry { name, oid });
        }
        Ok(entries)
    }

    /// Local branches whose name starts with `prefix`.
    pub fn local_branches(&self, prefix: &str) -> Result<Vec<BranchName>, GitError> {
        Ok(self
            .list_refs("refs/heads/")?
            .iter()
            .filter_map(|entry| entry.name.strip_prefix("refs/heads/"))
            .filter_map(|name| BranchName::new(name).ok())
            .filter(|branch| branch.has_prefix(prefix))
            .collect())
    }

    /// Remote-tracking branches whose branch part starts with `prefix`,
    /// as `(remote, branch)` pairs.
    pub fn remote_tracking_branches(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, BranchName)>, GitError> {
        let remotes = self.remotes()?;
        Ok(self
            .list_refs("refs/remotes/")?
            .iter()
            .filter_map(|entry| entry.name.strip_prefix("refs/remotes/"))
            .filter_map(|rest| split_tracking_ref(rest, &remotes))
            .filter_map(|(remote, name)| {
                BranchName::new(name)
                    .ok()
                    .map(|branch| (remote.to_string(), branch))
            })
            .filter(|(_, branch)| branch.has_prefix(prefix))
            .collect())
    }

    /// Configured remote names.
    pub fn remotes(&self) -> Result<Vec<String>, GitError> {
        let listing = self.runner.run(&["remote"]).require("list remotes")?;
        Ok(listing.lines().map(str::to_string).collect())
    }

    /// Whether `remote` is configured.
    pub fn has_remote(&self, remote: &str) -> Result<bool, GitError> {
        Ok(self.remotes()?.iter().any(|r| r == remote))
    }

    /// Branches the remote advertises right now, filtered by `prefix`.
    ///
    /// Uses the network timeout.
    pub fn remote_heads(&self, remote: &str, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        let listing = self
            .runner
            .run_network(&["ls-remote", "--heads", remote])
            .require("list remote branches")?;

        Ok(listing
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .filter_map(|(oid, name)| {
                let branch = name.strip_prefix("refs/heads/")?;
                if !branch.starts_with(prefix) {
                    return None;
                }
                Some(RefEntry {
                    name: RefName::new(name).ok()?,
                    oid: Oid::new(oid).ok()?,
                })
            })
            .collect())
    }

    /// Newest-first history of `branch`, at most `limit` commits.
    ///
    /// An absent branch has an empty history.
    pub fn history(&self, branch: &BranchName, limit: usize) -> Result<Vec<LogEntry>, GitError> {
        if !self.branch_exists(branch)? {
            return Ok(Vec::new());
        }
        let refname = RefName::for_branch(branch);
        let count = limit.to_string();
        let out = self.runner.run(&[
            "log",
            "--first-parent",
            "--format=%H%x1f%P%x1f%s%x1e",
            "-n",
            &count,
            refname.as_str(),
        ]);
        let command = out.command.clone();
        let listing = out.require("read branch history")?;

        listing
            .split('\x1e')
            .map(str::trim)
            .filter(|record| !record.is_empty())
            .map(|record| {
                parse_log_record(record).ok_or_else(|| GitError::UnexpectedOutput {
                    step: "read branch history".to_string(),
                    command: command.clone(),
                    output: record.to_string(),
                })
            })
            .collect()
    }
}

/// Split `<remote>/<branch>` using the configured remote names.
///
/// Remote names may contain `/`, so the longest configured remote that
/// prefixes `rest` wins. Tracking refs of removed remotes are skipped.
fn split_tracking_ref<'r>(rest: &'r str, remotes: &[String]) -> Option<(&'r str, &'r str)> {
    remotes
        .iter()
        .filter_map(|remote| {
            let branch = rest.strip_prefix(remote.as_str())?.strip_prefix('/')?;
            Some((&rest[..remote.len()], branch))
        })
        .max_by_key(|(remote, _)| remote.len())
}

/// Parse `<oid> US <parents> US <summary>`.
fn parse_log_record(record: &str) -> Option<LogEntry> {
    let mut fields = record.splitn(3, '\x1f');
    let oid = Oid::new(fields.next()?).ok()?;
    let parents = fields
        .next()?
        .split_whitespace()
        .map(Oid::new)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let summary = fields.next().unwrap_or_default().to_string();
    Some(LogEntry {
        oid,
        parents,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "3b18e512dba79e4c8300dd08aeb37f8e728b8dad";
    const B: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

    #[test]
    fn parses_root_commit_record() {
        let entry = parse_log_record(&format!("{A}\x1f\x1finitialize memory branch")).unwrap();
        assert_eq!(entry.oid.as_str(), A);
        assert!(entry.parents.is_empty());
        assert_eq!(entry.summary, "initialize memory branch");
    }

    #[test]
    fn parses_child_record() {
        let entry = parse_log_record(&format!("{A}\x1f{B}\x1fnote")).unwrap();
        assert_eq!(entry.parents.len(), 1);
        assert_eq!(entry.parents[0].as_str(), B);
    }

    #[test]
    fn rejects_bad_record() {
        assert!(parse_log_record("zzz\x1f\x1fx").is_none());
    }

    #[test]
    fn tracking_refs_split_on_the_longest_remote() {
        let remotes = vec!["origin".to_string(), "team/shared".to_string(), "team".to_string()];
        assert_eq!(
            split_tracking_ref("team/shared/memory/main", &remotes),
            Some(("team/shared", "memory/main"))
        );
        assert_eq!(
            split_tracking_ref("team/memory/main", &remotes),
            Some(("team", "memory/main"))
        );
        assert_eq!(
            split_tracking_ref("origin/memory/a1", &remotes),
            Some(("origin", "memory/a1"))
        );
        assert_eq!(split_tracking_ref("gone/memory/main", &remotes), None);
        assert_eq!(split_tracking_ref("originx/memory/main", &remotes), None);
    }

    #[test]
    fn expectation_descriptions() {
        let oid = Oid::new(A).unwrap();
        assert_eq!(RefExpectation::Any.describe(), "<any>");
        assert_eq!(RefExpectation::Absent.describe(), "<none>");
        assert_eq!(RefExpectation::Value(&oid).describe(), A);
    }

    #[test]
    fn snapshot_display() {
        let snap = HeadSnapshot {
            branch: Some("main".into()),
            commit: Some(Oid::new(A).unwrap()),
        };
        assert_eq!(snap.to_string(), "main at 3b18e51");

        let unborn = HeadSnapshot {
            branch: Some("main".into()),
            commit: None,
        };
        assert_eq!(unborn.to_string(), "main (unborn)");
    }
}
