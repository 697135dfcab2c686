//! core
//!
//! Domain types, naming rules and configuration for memory branches.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, BranchName, RefName
//! - [`naming`] - Sanitization of content paths, branch names, identifiers
//! - [`config`] - Configuration schema and layered loading
//!
//! Nothing in `core` runs git; it only decides what is valid.

pub mod config;
pub mod naming;
pub mod types;
