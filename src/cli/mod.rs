//! cli
//!
//! Command-line interface for membranch.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Open the repository through [`MemoryFacade`]
//! - Delegate to command handlers and format their results
//!
//! # Architecture
//!
//! The CLI layer is thin. Every repository effect goes through the facade;
//! handlers only move bytes between it and the terminal.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::memory::MemoryFacade;
use crate::ui::output::Verbosity;

/// Execution context shared by all handlers.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory to operate in; the process directory when `None`
    pub cwd: Option<PathBuf>,
    pub verbosity: Verbosity,
}

impl Context {
    /// Directory the repository is discovered from.
    pub fn work_dir(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    /// Open the memory facade for this context.
    pub fn open(&self) -> Result<MemoryFacade> {
        let dir = self.work_dir()?;
        MemoryFacade::open(&dir)
            .with_context(|| format!("Failed to open repository at {}", dir.display()))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`. Returns the process
/// exit code for outcomes that are not errors (e.g. `read` of an absent path).
pub fn run(cli: Cli) -> Result<i32> {
    let ctx = Context {
        cwd: cli.cwd.clone(),
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
    };

    commands::dispatch(cli.command, &ctx)
}
