use anyhow::{Result, bail};

use super::Session;
use super::plan::record_results;
use crate::Context;
use crate::engine::executor;
use crate::engine::{ExecuteOptions, planner};
use crate::ui;

pub fn run(ctx: &Context, label: Option<&str>, yes: bool) -> Result<()> {
    let mut session = Session::open()?;

    if let Some(label) = label
        && !session.state.policies.contains_key(label)
    {
        bail!("'{label}' is not tracked");
    }

    let plan = planner::plan_destroy(&session.state, label);
    if plan.is_empty() {
        ui::info("Nothing is tracked");
        return Ok(());
    }

    let client = session.client()?;
    let opts = ExecuteOptions {
        yes,
        quiet: ctx.quiet,
        ..Default::default()
    };
    let (summary, results) = executor::execute(&client, plan, &opts)?;

    record_results(&mut session.state, results);
    session.save()?;

    if !summary.is_success() {
        bail!("{} policies failed to drop", summary.failed);
    }
    Ok(())
}
