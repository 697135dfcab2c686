//! paths command - List the content paths on a memory branch

use anyhow::Result;

use crate::cli::Context;
use crate::ui::output;

pub fn paths(ctx: &Context, branch: Option<&str>) -> Result<()> {
    let memory = ctx.open()?;
    for path in memory.list_paths(branch)? {
        output::data(path);
    }
    Ok(())
}
