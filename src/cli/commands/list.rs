//! list command - List memory branches

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::ui::output;

/// List memory branches known locally or on the remote.
pub fn list(ctx: &Context, json: bool) -> Result<()> {
    let memory = ctx.open()?;
    let branches = memory
        .try_list_branches()
        .context("Failed to list memory branches")?;

    if json {
        output::json(&branches)?;
    } else {
        for branch in &branches {
            output::data(branch);
        }
    }
    Ok(())
}
