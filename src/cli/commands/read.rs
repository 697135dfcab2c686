//! read command - Print content from a memory branch

use std::io::Write as _;

use anyhow::{Context as _, Result};

use crate::cli::Context;

/// Print the content at `path`.
///
/// Returns `false` when the branch or path does not exist.
pub fn read(ctx: &Context, path: &str, branch: Option<&str>) -> Result<bool> {
    let memory = ctx.open()?;
    match memory.try_read(path, branch).context("Read failed")? {
        Some(content) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
            Ok(true)
        }
        None => Ok(false),
    }
}
