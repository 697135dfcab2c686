//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the memory facade
//! 3. Formats and displays output
//!
//! Handlers use the `try_*` facade methods so a failure reaches the user
//! with the step and command that failed.

mod list;
mod log_cmd;
mod paths;
mod persist;
mod push;
mod read;

pub use list::list;
pub use log_cmd::log;
pub use paths::paths;
pub use persist::persist;
pub use push::push;
pub use read::read;

use super::args::Command;
use super::Context;
use anyhow::Result;

/// Exit code for `read` when nothing is stored at the path.
pub const EXIT_NOT_FOUND: i32 = 1;

/// Dispatch a command to its handler and return the exit code.
pub fn dispatch(command: Command, ctx: &Context) -> Result<i32> {
    match command {
        Command::Persist {
            path,
            branch,
            message,
            namespace,
            source,
            push,
        } => persist::persist(
            ctx,
            &path,
            branch.as_deref(),
            message.as_deref(),
            namespace.as_deref(),
            &source,
            push,
        )
        .map(|()| 0),
        Command::Read { path, branch } => read::read(ctx, &path, branch.as_deref())
            .map(|found| if found { 0 } else { EXIT_NOT_FOUND }),
        Command::List { json } => list::list(ctx, json).map(|()| 0),
        Command::Paths { branch } => paths::paths(ctx, branch.as_deref()).map(|()| 0),
        Command::Log {
            branch,
            limit,
            json,
        } => log_cmd::log(ctx, branch.as_deref(), limit, json).map(|()| 0),
        Command::Push {
            branch,
            force,
            yes_force,
        } => push::push(ctx, branch.as_deref(), force, yes_force).map(|()| 0),
    }
}
