//! log command - Show memory branch history

use anyhow::Result;

use crate::cli::Context;
use crate::ui::output;

/// Show up to `limit` commits of a memory branch, newest first.
pub fn log(ctx: &Context, branch: Option<&str>, limit: usize, json: bool) -> Result<()> {
    let memory = ctx.open()?;
    let history = memory.history(branch, limit)?;

    if json {
        output::json(&history)?;
        return Ok(());
    }
    for commit in &history {
        output::data(format!("{} {}", output::format_oid(&commit.oid), commit.summary));
    }
    Ok(())
}
