//! Execution planner: desired declarations vs tracked state, per label

use policykit::{AttributeDiff, PolicyConfig, ResourceData, compute_drift, requires_replacement};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::state::StateFile;

/// What applying a label will do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Declared but not tracked
    Create,
    /// Tracked with drift outside the identity; the update verb decides
    /// whether it can be altered in place
    Update(Vec<AttributeDiff>),
    /// Tracked with identity drift
    Replace(Vec<AttributeDiff>),
    /// Tracked but no longer declared
    Delete,
    NoOp,
}

impl Action {
    pub fn is_change(&self) -> bool {
        !matches!(self, Action::NoOp)
    }

    pub fn diffs(&self) -> &[AttributeDiff] {
        match self {
            Action::Update(diffs) | Action::Replace(diffs) => diffs,
            _ => &[],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Update(_) => "update",
            Action::Replace(_) => "replace",
            Action::Delete => "delete",
            Action::NoOp => "no-op",
        };
        write!(f, "{name}")
    }
}

/// One planned action with the slot it runs against
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub label: String,
    pub action: Action,
    pub data: ResourceData,
}

/// Everything `apply` would do, ordered by label
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Changes that actually touch the remote system
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action.is_change())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }
}

/// Build a plan from declarations and tracked state
pub fn plan(desired: &BTreeMap<String, PolicyConfig>, state: &StateFile) -> ExecutionPlan {
    let labels: BTreeSet<&String> = desired.keys().chain(state.policies.keys()).collect();

    let changes = labels
        .into_iter()
        .map(|label| {
            let config = desired.get(label).cloned();
            let data = state.resource(label, config);
            let action = action_for(&data);
            log::debug!("Planned {action} for '{label}'");
            PlannedChange {
                label: label.clone(),
                action,
                data,
            }
        })
        .collect();

    ExecutionPlan { changes }
}

/// Plan the removal of tracked policies only, optionally a single label
pub fn plan_destroy(state: &StateFile, only: Option<&str>) -> ExecutionPlan {
    let changes = state
        .policies
        .keys()
        .filter(|label| only.is_none_or(|o| o == label.as_str()))
        .map(|label| PlannedChange {
            label: label.clone(),
            action: Action::Delete,
            data: state.resource(label, None),
        })
        .collect();

    ExecutionPlan { changes }
}

fn action_for(data: &ResourceData) -> Action {
    match (data.config(), data.is_tracked(), data.state()) {
        (None, false, _) => Action::NoOp,
        (None, true, _) => Action::Delete,
        (Some(_), false, _) => Action::Create,
        // Tracked key without attributes cannot be diffed
        (Some(_), true, None) => Action::Replace(Vec::new()),
        (Some(config), true, Some(tracked)) => {
            let diffs = compute_drift(tracked, config);
            if diffs.is_empty() {
                Action::NoOp
            } else if requires_replacement(&diffs) {
                Action::Replace(diffs)
            } else {
                Action::Update(diffs)
            }
        }
    }
}
