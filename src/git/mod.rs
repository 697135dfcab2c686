//! git
//!
//! Plumbing-level access to the repository.
//!
//! # Architecture
//!
//! Every interaction with git goes through a [`CommandRunner`] bound to an
//! explicit [`RepoContext`]. Two thin views sit on top of it:
//!
//! - [`ObjectWriter`] creates blobs, trees and commits and reads content
//!   back by `rev:path`.
//! - [`RefResolver`] reads HEAD and branch tips, moves refs and enumerates
//!   branches.
//!
//! Only plumbing commands are used (`hash-object`, `read-tree`,
//! `update-index`, `write-tree`, `commit-tree`, `update-ref`, ...). Nothing
//! here checks out a branch or touches the caller's index.
//!
//! # Invariants
//!
//! - Trees are built in a private scratch index, removed on every exit path
//! - Ref moves name the ref explicitly; HEAD is only ever read
//! - All values crossing the boundary are strong types (`Oid`, `BranchName`)
//!
//! # Example
//!
//! ```no_run
//! use membranch::git::{CommandRunner, ObjectWriter, RepoContext};
//!
//! let runner = CommandRunner::new(RepoContext::new("/path/to/repo")).unwrap();
//! let objects = ObjectWriter::new(&runner);
//! let blob = objects.write_blob(b"hello").unwrap();
//! println!("stored {}", blob.short(7));
//! ```

mod error;
mod objects;
mod refs;
mod runner;

pub use error::GitError;
pub use objects::{ObjectWriter, TreeEntry, BLOB_MODE};
pub use refs::{HeadSnapshot, LogEntry, RefEntry, RefExpectation, RefResolver};
pub use runner::{CommandOutput, CommandRunner, RepoContext, RunFailure, DEFAULT_TIMEOUT};
