use anyhow::{Result, bail};
use policykit::{Client, PolicyConfig};
use std::collections::BTreeMap;

use super::refresh::{self, RefreshOutcome};
use super::{Session, load_declarations};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::executor::{self, ApplyResult};
use crate::engine::{ExecuteOptions, ExecutionPlan, differ, planner};
use crate::state::StateFile;
use crate::ui;

/// Refresh tracked state, then show the plan
pub fn plan(ctx: &Context, file: Option<&str>) -> Result<()> {
    let desired = load_declarations(file)?;
    let mut session = Session::open()?;
    let client = session.client()?;

    let plan = refresh_and_plan(ctx, &client, &desired, &mut session.state)?;
    session.save()?;

    differ::display_plan(&plan);
    Ok(())
}

/// Refresh tracked state, then apply the plan
pub fn apply(ctx: &Context, file: Option<&str>, args: &ApplyArgs) -> Result<()> {
    let desired = load_declarations(file)?;
    let mut session = Session::open()?;
    let client = session.client()?;

    let plan = refresh_and_plan(ctx, &client, &desired, &mut session.state)?;
    session.save()?;

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: usize::from(args.jobs),
        yes: args.yes,
        quiet: ctx.quiet,
    };
    let (summary, results) = executor::execute(&client, plan, &opts)?;

    record_results(&mut session.state, results);
    session.save()?;

    if !summary.is_success() {
        bail!("{} policies failed to apply", summary.failed);
    }
    Ok(())
}

fn refresh_and_plan(
    ctx: &Context,
    client: &Client,
    desired: &BTreeMap<String, PolicyConfig>,
    state: &mut StateFile,
) -> Result<ExecutionPlan> {
    if !state.policies.is_empty() {
        ui::info("Refreshing tracked state...");
        let outcomes = refresh::refresh_all(client, state);
        let reportable: Vec<_> = outcomes
            .into_iter()
            .filter(|(_, o)| !matches!(o, RefreshOutcome::Refreshed))
            .collect();
        refresh::report(ctx, &reportable)?;
    }
    Ok(planner::plan(desired, state))
}

/// Persist the slot of every applied label
pub fn record_results(state: &mut StateFile, results: Vec<ApplyResult>) {
    for result in results {
        state.record(&result.label, result.data);
    }
}
