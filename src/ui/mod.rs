//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing and log filter selection
//!
//! # Design
//!
//! Results go to stdout, diagnostics to stderr. Quiet mode silences
//! everything except errors and the data a command was asked to print.

pub mod output;
