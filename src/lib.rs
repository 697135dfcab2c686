//! membranch - isolated memory branches for coordination documents
//!
//! membranch persists small text documents (agent notes, session state,
//! plans) onto dedicated branches of a git repository without checking them
//! out. Writes go straight to the object store through plumbing commands, so
//! the caller's current branch, index and working tree are never touched.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the facade)
//! - [`memory`] - Commit protocol, safe push and the [`memory::MemoryFacade`]
//! - [`git`] - Plumbing command execution, object writes and ref access
//! - [`core`] - Strong types, name sanitization and configuration
//! - [`ui`] - Terminal output
//!
//! # Correctness Invariants
//!
//! 1. A memory branch starts with a parentless commit over the empty tree
//! 2. Every later commit has exactly one parent, the tip it was built on
//! 3. HEAD, the index and the working tree are never written
//! 4. Content paths are sanitized before any object is created
//! 5. Force pushes to protected branches are refused before anything is sent

pub mod cli;
pub mod core;
pub mod git;
pub mod memory;
pub mod ui;
