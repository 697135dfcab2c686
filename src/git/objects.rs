//! git::objects
//!
//! Object-store writes and reads that never touch the caller's index or
//! working tree.
//!
//! # Scratch index
//!
//! Trees are assembled in a throwaway index file inside a private temporary
//! directory and selected with `GIT_INDEX_FILE`. The directory is removed
//! when the guard drops, on success and on every error path alike. Blob
//! content is staged the same way.
//!
//! # Empty tree
//!
//! The empty tree id depends on the repository's hash algorithm, so it is
//! asked of git (`git mktree` over empty input) instead of being hardcoded.

use std::io::Write;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::GitError;
use super::runner::CommandRunner;
use crate::core::naming::ContentPath;
use crate::core::types::Oid;

/// File mode used for every blob written onto a memory branch.
pub const BLOB_MODE: &str = "100644";

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Octal mode, e.g. `100644`.
    pub mode: String,
    /// Object type (`blob`, `tree`, `commit`).
    pub kind: String,
    /// Object id.
    pub oid: Oid,
    /// Path relative to the tree root.
    pub path: String,
}

/// Creates blobs, trees and commits from explicit inputs.
pub struct ObjectWriter<'a> {
    runner: &'a CommandRunner,
    empty_tree: OnceLock<Oid>,
}

impl<'a> ObjectWriter<'a> {
    /// Create a writer using the given runner.
    pub fn new(runner: &'a CommandRunner) -> Self {
        Self {
            runner,
            empty_tree: OnceLock::new(),
        }
    }

    /// Id of the empty tree, written to the object store on first use.
    pub fn empty_tree(&self) -> Result<Oid, GitError> {
        if let Some(oid) = self.empty_tree.get() {
            return Ok(oid.clone());
        }
        let oid = parse_oid("write empty tree", self.runner.run(&["mktree"]))?;
        Ok(self.empty_tree.get_or_init(|| oid).clone())
    }

    /// Store `content` as a blob and return its id.
    ///
    /// Identical content always yields the identical id; writing it again
    /// does not create a second object.
    pub fn write_blob(&self, content: &[u8]) -> Result<Oid, GitError> {
        let mut staged = tempfile::Builder::new()
            .prefix("membranch-blob-")
            .tempfile()
            .map_err(|source| GitError::Io {
                what: "blob staging file".to_string(),
                source,
            })?;
        staged
            .write_all(content)
            .and_then(|_| staged.flush())
            .map_err(|source| GitError::Io {
                what: "blob staging file".to_string(),
                source,
            })?;

        let path = staged.path().to_string_lossy().into_owned();
        let out = self
            .runner
            .run(&["hash-object", "-w", "--no-filters", "--", &path]);
        parse_oid("write blob", out)
    }

    /// Resolve `rev` to a tree id, `None` if it does not name one.
    pub fn resolve_tree(&self, rev: &str) -> Result<Option<Oid>, GitError> {
        let spec = format!("{}^{{tree}}", rev);
        let out = self.runner.run(&["rev-parse", "--verify", "-q", &spec]);
        if out.success {
            return Ok(Some(Oid::new(out.require("resolve tree")?)?));
        }
        if out.is_negative_answer() {
            return Ok(None);
        }
        Err(GitError::from_output("resolve tree", &out))
    }

    /// Write a tree equal to `base` with `path` set to `blob`.
    ///
    /// A `base` of `None`, or one that does not resolve to a tree, starts
    /// from the empty tree.
    pub fn build_tree(
        &self,
        base: Option<&Oid>,
        path: &ContentPath,
        blob: &Oid,
    ) -> Result<Oid, GitError> {
        let base = match base {
            Some(oid) => match self.resolve_tree(oid.as_str())? {
                Some(tree) => tree,
                None => {
                    debug!(base = %oid, "base tree unresolvable, starting from empty tree");
                    self.empty_tree()?
                }
            },
            None => self.empty_tree()?,
        };

        let scratch = tempfile::Builder::new()
            .prefix("membranch-index-")
            .tempdir()
            .map_err(|source| GitError::Io {
                what: "scratch index directory".to_string(),
                source,
            })?;
        let index = scratch.path().join("index");
        let index = index.to_string_lossy();
        let env = [("GIT_INDEX_FILE", index.as_ref())];
        let timeout = self.runner.context().timeout;

        self.runner
            .run_with(&["read-tree", base.as_str()], &env, timeout)
            .require("load base tree into scratch index")?;

        let cacheinfo = format!("{},{},{}", BLOB_MODE, blob, path);
        self.runner
            .run_with(
                &["update-index", "--add", "--cacheinfo", &cacheinfo],
                &env,
                timeout,
            )
            .require("stage path in scratch index")?;

        let out = self.runner.run_with(&["write-tree"], &env, timeout);
        parse_oid("write tree", out)
    }

    /// Write a commit of `tree` with at most one parent.
    ///
    /// `when` becomes both author and committer date.
    pub fn write_commit(
        &self,
        tree: &Oid,
        parent: Option<&Oid>,
        message: &str,
        when: DateTime<Utc>,
    ) -> Result<Oid, GitError> {
        let mut args = vec!["commit-tree", tree.as_str()];
        if let Some(parent) = parent {
            args.extend(["-p", parent.as_str()]);
        }
        args.extend(["-m", message]);

        let date = format!("{} +0000", when.timestamp());
        let env = [
            ("GIT_AUTHOR_DATE", date.as_str()),
            ("GIT_COMMITTER_DATE", date.as_str()),
        ];
        let out = self
            .runner
            .run_with(&args, &env, self.runner.context().timeout);
        parse_oid("write commit", out)
    }

    /// Type of the object at `<rev>:<path>` (`blob`, `tree`, ...), `None`
    /// if there is none.
    fn object_type(&self, rev: &str, path: &str) -> Result<Option<String>, GitError> {
        let location = format!("{}:{}", rev, path);
        let out = self.runner.run(&["cat-file", "-t", &location]);
        if out.success {
            return Ok(Some(out.require("read object type")?));
        }
        if out.completed() {
            return Ok(None);
        }
        Err(GitError::from_output("read object type", &out))
    }

    /// An entry of `rev`'s tree that `path` cannot coexist with: a file at
    /// one of its parent directories, or a directory at `path` itself.
    pub fn path_conflict(&self, rev: &str, path: &ContentPath) -> Result<Option<String>, GitError> {
        let full = path.as_str();
        for (end, _) in full.match_indices('/') {
            let parent = &full[..end];
            match self.object_type(rev, parent)?.as_deref() {
                None => return Ok(None),
                Some("tree") => {}
                Some(_) => return Ok(Some(format!("file '{}'", parent))),
            }
        }
        match self.object_type(rev, full)?.as_deref() {
            Some("tree") => Ok(Some(format!("directory '{}'", full))),
            _ => Ok(None),
        }
    }

    /// Content of `path` in `rev`'s tree.
    ///
    /// `None` if `rev` or `path` is absent, or if `path` names a directory.
    pub fn read_blob_at(&self, rev: &str, path: &ContentPath) -> Result<Option<Vec<u8>>, GitError> {
        match self.object_type(rev, path.as_str())?.as_deref() {
            None => return Ok(None),
            Some("blob") => {}
            Some(kind) => {
                debug!(rev, %path, kind, "not a blob");
                return Ok(None);
            }
        }

        let location = format!("{}:{}", rev, path);
        let out = self.runner.run(&["cat-file", "blob", &location]);
        if out.success {
            Ok(Some(out.stdout))
        } else {
            Err(GitError::from_output("read blob", &out))
        }
    }

    /// Content of `path` in `rev` as UTF-8 text.
    pub fn read_text_at(&self, rev: &str, path: &ContentPath) -> Result<Option<String>, GitError> {
        match self.read_blob_at(rev, path)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| GitError::InvalidUtf8 {
                    location: format!("{}:{}", rev, path),
                }),
            None => Ok(None),
        }
    }

    /// Every blob under `rev`'s tree, recursively.
    pub fn list_tree(&self, rev: &str) -> Result<Vec<TreeEntry>, GitError> {
        let out = self.runner.run(&["ls-tree", "-r", "-z", "--full-tree", rev]);
        if !out.success {
            return Err(GitError::from_output("list tree", &out));
        }
        let command = out.command.clone();
        let stdout = out.stdout_lossy();

        stdout
            .split('\0')
            .filter(|record| !record.is_empty())
            .map(|record| {
                parse_tree_entry(record).ok_or_else(|| GitError::UnexpectedOutput {
                    step: "list tree".to_string(),
                    command: command.clone(),
                    output: record.to_string(),
                })
            })
            .collect()
    }
}

/// Parse `<mode> SP <type> SP <oid> TAB <path>`.
fn parse_tree_entry(record: &str) -> Option<TreeEntry> {
    let (meta, path) = record.split_once('\t')?;
    let mut fields = meta.split(' ');
    let mode = fields.next()?.to_string();
    let kind = fields.next()?.to_string();
    let oid = Oid::new(fields.next()?).ok()?;
    Some(TreeEntry {
        mode,
        kind,
        oid,
        path: path.to_string(),
    })
}

fn parse_oid(step: &str, out: super::runner::CommandOutput) -> Result<Oid, GitError> {
    let command = out.command.clone();
    let text = out.require(step)?;
    Oid::new(text.as_str()).map_err(|_| GitError::UnexpectedOutput {
        step: step.to_string(),
        command,
        output: text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ls_tree_records() {
        let entry = parse_tree_entry(
            "100644 blob 3b18e512dba79e4c8300dd08aeb37f8e728b8dad\tagents/a1/note.md",
        )
        .unwrap();
        assert_eq!(entry.mode, "100644");
        assert_eq!(entry.kind, "blob");
        assert_eq!(entry.path, "agents/a1/note.md");
    }

    #[test]
    fn paths_keep_spaces_after_tab() {
        let entry = parse_tree_entry(
            "100644 blob 3b18e512dba79e4c8300dd08aeb37f8e728b8dad\ta b/c d.md",
        )
        .unwrap();
        assert_eq!(entry.path, "a b/c d.md");
    }

    #[test]
    fn rejects_malformed_records() {
        assert!(parse_tree_entry("garbage").is_none());
        assert!(parse_tree_entry("100644 blob nothex\tpath").is_none());
    }
}
