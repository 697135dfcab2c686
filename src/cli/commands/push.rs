//! push command - Publish a memory branch

use anyhow::Result;

use crate::cli::Context;
use crate::memory::{PushOptions, PushOutcome};
use crate::ui::output;

/// Publish a memory branch through the push safety checks.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `branch` - Memory branch, the configured default when `None`
/// * `force` - Request a force push
/// * `yes_force` - Confirm the force push
pub fn push(ctx: &Context, branch: Option<&str>, force: bool, yes_force: bool) -> Result<()> {
    let memory = ctx.open()?;
    let options = PushOptions {
        force,
        explicit_force: yes_force,
    };

    let outcome = memory.try_push(branch, options).map_err(|err| {
        let what = if err.is_safety_violation() {
            "Push refused"
        } else {
            "Push failed"
        };
        anyhow::Error::new(err).context(what)
    })?;

    match outcome {
        PushOutcome::UpToDate { branch, .. } => {
            output::print(format!("{} is up to date", branch), ctx.verbosity)
        }
        PushOutcome::Pushed {
            branch,
            commit,
            set_upstream,
            forced,
        } => {
            let mut line = format!("Pushed {} at {}", branch, output::format_oid(&commit));
            if set_upstream {
                line.push_str(" (upstream set)");
            }
            if forced {
                line.push_str(" (forced)");
            }
            output::print(line, ctx.verbosity);
        }
    }
    Ok(())
}
