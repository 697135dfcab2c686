//! persist command - Commit content to a memory branch

use std::io::Read as _;

use anyhow::{Context as _, Result};

use crate::cli::args::ContentSource;
use crate::cli::Context;
use crate::core::naming::ContentPath;
use crate::memory::PublishStatus;
use crate::ui::output;

/// Commit content at `path` on a memory branch.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `path` - Content path inside the branch
/// * `branch` - Memory branch, the configured default when `None`
/// * `message` - Commit message, generated when `None`
/// * `namespace` - Optional namespace segment prepended to `path`
/// * `source` - Inline content or file; standard input when neither is set
/// * `push` - Publish after committing
pub fn persist(
    ctx: &Context,
    path: &str,
    branch: Option<&str>,
    message: Option<&str>,
    namespace: Option<&str>,
    source: &ContentSource,
    push: bool,
) -> Result<()> {
    let content = read_content(source)?;
    let memory = ctx.open()?;
    let memory = if push { memory.with_auto_push(true) } else { memory };

    let path = match namespace {
        Some(ns) => memory.namespaced_path(ns, path)?,
        None => ContentPath::parse(path)?,
    };
    let receipt = memory
        .persist_at(&content, &path, branch, message)
        .context("Persist failed")?;

    if receipt.created_branch {
        output::print(format!("Created {}", receipt.branch), ctx.verbosity);
    }
    output::print(
        format!(
            "{} {} -> {}",
            receipt.branch,
            output::format_oid(&receipt.commit),
            receipt.path
        ),
        ctx.verbosity,
    );

    match &receipt.publish {
        PublishStatus::Skipped => {}
        PublishStatus::Published => output::print("Published", ctx.verbosity),
        PublishStatus::Failed(reason) => {
            output::warn(format!("commit kept locally; publish failed: {}", reason), ctx.verbosity)
        }
    }
    Ok(())
}

fn read_content(source: &ContentSource) -> Result<Vec<u8>> {
    if let Some(content) = &source.content {
        return Ok(content.clone().into_bytes());
    }
    if let Some(file) = &source.file {
        return std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()));
    }
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read content from stdin")?;
    Ok(buf)
}
