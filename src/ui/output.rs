//! ui::output
//!
//! Terminal output for `mb`.
//!
//! # Design
//!
//! Output respects the quiet flag. When `--json` is enabled, output is
//! machine-readable JSON. [`Verbosity`] also picks the default `tracing`
//! filter for the binary.

use std::fmt::Display;

use serde::Serialize;

use crate::core::types::Oid;

/// How much `mb` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `-q`: errors and requested data only
    Quiet,
    /// Default
    Normal,
    /// `--debug`: debug logs from this crate
    Debug,
}

impl Verbosity {
    /// Quiet wins when both flags are given.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Debug => "membranch=debug,info",
        }
    }
}

/// Progress or confirmation line on stdout; silent when quiet.
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a result line (always shown; it is what the command was asked for).
pub fn data(message: impl Display) {
    println!("{}", message);
}

/// Error on stderr, even when quiet.
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Warning on stderr; silent when quiet.
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a value as pretty JSON.
pub fn json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Abbreviated object id for display.
pub fn format_oid(oid: &Oid) -> &str {
    oid.short(7)
}
