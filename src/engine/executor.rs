//! Execution engine: applies planned changes with a bounded worker pool

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use policykit::{Client, ResourceData};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

use crate::progress;

use super::differ::display_plan;
use super::planner::{Action, ExecutionPlan, PlannedChange};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Hide progress output
    pub quiet: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            quiet: false,
        }
    }
}

/// What happened to one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    NoChange,
    Created,
    Modified,
    Replaced,
    Removed,
    Failed { error: String },
}

/// Outcome of one label with its slot after the verbs ran
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub label: String,
    pub outcome: ApplyOutcome,
    pub data: ResourceData,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub replaced: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.replaced + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Show the plan, confirm, and apply it
///
/// Returns the per-label results so the caller can persist tracked state.
pub fn execute(
    client: &Client,
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
) -> Result<(ExecuteSummary, Vec<ApplyResult>)> {
    display_plan(&plan);

    let pending = plan.pending_count();
    if pending == 0 {
        return Ok((ExecuteSummary::default(), Vec::new()));
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok((ExecuteSummary::default(), Vec::new()));
    }

    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok((
            ExecuteSummary {
                skipped: pending,
                ..Default::default()
            },
            Vec::new(),
        ));
    }

    println!();
    println!("  {} Applying {} policies...", "→".cyan(), pending);

    let changes: Vec<PlannedChange> = plan
        .changes
        .into_iter()
        .filter(|c| c.action.is_change())
        .collect();
    let results = execute_parallel(client, changes, opts)?;

    let mut summary = ExecuteSummary::default();
    merge_summary(&mut summary, &results);
    print_failures(&results);
    print_summary(&summary);

    Ok((summary, results))
}

/// Apply changes in parallel; each label's verbs run serially
pub fn execute_parallel(
    client: &Client,
    changes: Vec<PlannedChange>,
    opts: &ExecuteOptions,
) -> Result<Vec<ApplyResult>> {
    let pb = progress::bar(changes.len() as u64, "Applying", opts.quiet);
    let results: Arc<Mutex<Vec<ApplyResult>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        changes.into_par_iter().for_each(|change| {
            let result = apply_change(client, change);

            let symbol = match &result.outcome {
                ApplyOutcome::NoChange => "○",
                ApplyOutcome::Failed { .. } => "✗",
                _ => "✓",
            };
            pb.set_message(format!("{} {}", symbol, result.label));
            pb.inc(1);

            push_apply_result(&results, result);
        });
    });

    pb.finish_and_clear();

    let mut collected = into_apply_results(results)?;
    collected.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(collected)
}

/// Run the lifecycle verbs for one planned change
fn apply_change(client: &Client, change: PlannedChange) -> ApplyResult {
    let PlannedChange {
        label,
        action,
        mut data,
    } = change;

    let outcome = match action {
        Action::NoOp => Ok(ApplyOutcome::NoChange),
        Action::Create => client.create(&mut data).map(|()| ApplyOutcome::Created),
        Action::Update(_) => client.update(&mut data).map(|()| ApplyOutcome::Modified),
        Action::Delete => client.delete(&mut data).map(|()| ApplyOutcome::Removed),
        Action::Replace(_) => client
            .delete(&mut data)
            .and_then(|()| client.create(&mut data))
            .map(|()| ApplyOutcome::Replaced),
    };

    let outcome = outcome.unwrap_or_else(|e| {
        log::warn!("'{label}' failed: {e}");
        ApplyOutcome::Failed {
            error: e.to_string(),
        }
    });

    ApplyResult {
        label,
        outcome,
        data,
    }
}

fn push_apply_result(results: &Arc<Mutex<Vec<ApplyResult>>>, result: ApplyResult) {
    match results.lock() {
        Ok(mut locked) => locked.push(result),
        Err(poisoned) => poisoned.into_inner().push(result),
    }
}

fn into_apply_results(results: Arc<Mutex<Vec<ApplyResult>>>) -> Result<Vec<ApplyResult>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Merge results into summary
fn merge_summary(summary: &mut ExecuteSummary, results: &[ApplyResult]) {
    for result in results {
        match result.outcome {
            ApplyOutcome::NoChange => summary.no_change += 1,
            ApplyOutcome::Created => summary.created += 1,
            ApplyOutcome::Modified => summary.modified += 1,
            ApplyOutcome::Replaced => summary.replaced += 1,
            ApplyOutcome::Removed => summary.removed += 1,
            ApplyOutcome::Failed { .. } => summary.failed += 1,
        }
    }
}

/// Confirm with user
pub fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

fn print_failures(results: &[ApplyResult]) {
    for result in results {
        if let ApplyOutcome::Failed { error } = &result.outcome {
            println!("    {} {}: {}", "✗".red(), result.label.bold(), error);
        }
    }
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!(
            "  {} Policies applied successfully! ({} changes)",
            "✓".green().bold(),
            summary.total_changes()
        );
    } else {
        println!("  {} Policies applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} policies created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} policies modified", summary.modified);
    }
    if summary.replaced > 0 {
        println!("    • {} policies replaced", summary.replaced);
    }
    if summary.removed > 0 {
        println!("    • {} policies removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} policies skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "policies".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::planner;
    use crate::state::StateFile;
    use policykit::backend::memory::MemoryBackend;
    use policykit::{PolicyConfig, PolicyIdentifier};
    use std::collections::BTreeMap;

    fn opts() -> ExecuteOptions {
        ExecuteOptions {
            yes: true,
            quiet: true,
            jobs: 2,
            ..Default::default()
        }
    }

    fn desired(entries: &[(&str, PolicyConfig)]) -> BTreeMap<String, PolicyConfig> {
        entries
            .iter()
            .map(|(label, config)| ((*label).to_string(), config.clone()))
            .collect()
    }

    fn run(client: &Client, plan: ExecutionPlan) -> Vec<ApplyResult> {
        let changes = plan.changes.into_iter().filter(|c| c.action.is_change()).collect();
        execute_parallel(client, changes, &opts()).unwrap()
    }

    #[test]
    fn test_create_many_in_parallel() {
        let client = Client::new(MemoryBackend::new());
        let configs = desired(&[
            ("a", PolicyConfig::new("DB", "SCH", "A")),
            ("b", PolicyConfig::new("DB", "SCH", "B")),
            ("c", PolicyConfig::new("DB", "SCH", "C")),
        ]);

        let results = run(&client, planner::plan(&configs, &StateFile::default()));
        let labels: Vec<_> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["a", "b", "c"]);
        assert!(results.iter().all(|r| r.outcome == ApplyOutcome::Created));
        assert!(results.iter().all(|r| r.data.is_tracked()));
    }

    #[test]
    fn test_failure_is_collected_per_label() {
        let backend = MemoryBackend::new();
        backend.insert(
            PolicyIdentifier::new("DB", "SCH", "TAKEN").unwrap(),
            policykit::backend::memory::StoredPolicy {
                settings: Default::default(),
                comment: None,
            },
        );
        let client = Client::new(backend);
        let configs = desired(&[
            ("free", PolicyConfig::new("DB", "SCH", "FREE")),
            ("taken", PolicyConfig::new("DB", "SCH", "TAKEN")),
        ]);

        let results = run(&client, planner::plan(&configs, &StateFile::default()));
        let mut summary = ExecuteSummary::default();
        merge_summary(&mut summary, &results);

        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
        let taken = results.iter().find(|r| r.label == "taken").unwrap();
        assert!(matches!(&taken.outcome, ApplyOutcome::Failed { error } if error.contains("already exists")));
        assert!(!taken.data.is_tracked());
    }

    #[test]
    fn test_replace_and_delete() {
        let client = Client::new(MemoryBackend::new());
        let mut state = StateFile::default();
        let initial = desired(&[
            ("keep", PolicyConfig::new("DB", "SCH", "OLD")),
            ("drop", PolicyConfig::new("DB", "SCH", "GONE")),
        ]);
        for result in run(&client, planner::plan(&initial, &state)) {
            state.record(&result.label, result.data);
        }

        let next = desired(&[("keep", PolicyConfig::new("DB", "SCH", "NEW"))]);
        let results = run(&client, planner::plan(&next, &state));
        let outcomes: Vec<_> = results.iter().map(|r| (r.label.as_str(), &r.outcome)).collect();
        assert_eq!(
            outcomes,
            [("drop", &ApplyOutcome::Removed), ("keep", &ApplyOutcome::Replaced)]
        );

        for result in results {
            state.record(&result.label, result.data);
        }
        assert_eq!(state.policies.len(), 1);
        assert_eq!(state.policies["keep"].id, "DB|SCH|NEW");
    }

    #[test]
    fn push_apply_result_handles_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ApplyResult>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let _guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        push_apply_result(
            &results,
            ApplyResult {
                label: "p".to_string(),
                outcome: ApplyOutcome::NoChange,
                data: ResourceData::new(),
            },
        );

        let collected = into_apply_results(results).expect("poisoned mutex should be recovered");
        assert_eq!(collected.len(), 1);
    }
}
