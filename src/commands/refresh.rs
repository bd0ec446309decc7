use anyhow::{Result, bail};
use colored::Colorize;
use policykit::Client;

use super::Session;
use crate::Context;
use crate::state::StateFile;
use crate::ui;

/// What a refresh did to one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// The policy was dropped out-of-band and is no longer tracked
    Gone,
    Failed(String),
}

pub fn run(ctx: &Context) -> Result<()> {
    let mut session = Session::open()?;
    let client = session.client()?;

    let outcomes = refresh_all(&client, &mut session.state);
    session.save()?;

    report(ctx, &outcomes)
}

/// Read every tracked policy, updating `state` in place
pub fn refresh_all(client: &Client, state: &mut StateFile) -> Vec<(String, RefreshOutcome)> {
    let labels: Vec<String> = state.policies.keys().cloned().collect();
    let mut outcomes = Vec::with_capacity(labels.len());

    for label in labels {
        let mut data = state.resource(&label, None);
        let outcome = match client.read(&mut data) {
            Ok(()) if data.is_tracked() => RefreshOutcome::Refreshed,
            Ok(()) => RefreshOutcome::Gone,
            Err(e) => RefreshOutcome::Failed(e.to_string()),
        };
        if !matches!(outcome, RefreshOutcome::Failed(_)) {
            state.record(&label, data);
        }
        outcomes.push((label, outcome));
    }
    outcomes
}

/// Print per-label outcomes; failures make the command fail
pub fn report(ctx: &Context, outcomes: &[(String, RefreshOutcome)]) -> Result<()> {
    let mut failed = 0;
    for (label, outcome) in outcomes {
        match outcome {
            RefreshOutcome::Refreshed => {
                if !ctx.quiet {
                    println!("  {} {}", "✓".green(), label);
                }
            }
            RefreshOutcome::Gone => {
                ui::warn(&format!("{label}: no longer exists, removed from tracked state"));
            }
            RefreshOutcome::Failed(error) => {
                failed += 1;
                ui::error(&format!("{label}: {error}"));
            }
        }
    }

    if failed > 0 {
        bail!("{failed} policies could not be refreshed");
    }
    Ok(())
}
