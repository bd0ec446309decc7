//! Plan display

use colored::{ColoredString, Colorize};
use policykit::AttributeDiff;

use super::planner::{Action, ExecutionPlan, PlannedChange};

fn symbol(action: &Action) -> ColoredString {
    match action {
        Action::Create => "+".green(),
        Action::Delete => "-".red(),
        Action::Update(_) => "~".yellow(),
        Action::Replace(_) => "±".magenta(),
        Action::NoOp => "○".dimmed(),
    }
}

/// Policy name shown next to the label
fn target(change: &PlannedChange) -> String {
    if let Some(config) = change.data.config() {
        return format!("{}.{}.{}", config.database, config.schema, config.name);
    }
    change
        .data
        .state()
        .map(|s| format!("{}.{}.{}", s.database, s.schema, s.name))
        .unwrap_or_else(|| change.data.id().unwrap_or_default().to_string())
}

fn diff_line(diff: &AttributeDiff) -> String {
    let marker = if diff.requires_replacement() {
        " (forces replacement)".red().to_string()
    } else {
        String::new()
    };
    format!(
        "{}: {} → {}{}",
        diff.field, diff.tracked, diff.desired, marker
    )
}

/// Display a plan in a user-friendly format
pub fn display_plan(plan: &ExecutionPlan) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Authentication Policies".bold()
    );
    println!("│");

    for change in plan.pending() {
        println!(
            "│   {} {:<20} {} {}",
            symbol(&change.action),
            change.label,
            target(change).dimmed(),
            format!("({})", change.action).dimmed()
        );
        for diff in change.action.diffs() {
            println!("│       {}", diff_line(diff));
        }
    }
    println!("│");

    let count = |f: fn(&Action) -> bool| plan.pending().filter(|c| f(&c.action)).count();
    let created = count(|a| matches!(a, Action::Create));
    let updated = count(|a| matches!(a, Action::Update(_)));
    let replaced = count(|a| matches!(a, Action::Replace(_)));
    let deleted = count(|a| matches!(a, Action::Delete));

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to replace, {} to delete",
        created.to_string().green(),
        updated.to_string().yellow(),
        replaced.to_string().magenta(),
        deleted.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use policykit::{Field, FieldValue, PolicyConfig, ResourceData};

    #[test]
    fn test_diff_line_marks_replacement() {
        let diff = AttributeDiff {
            field: Field::Name,
            tracked: FieldValue::Text("OLD".to_string()),
            desired: FieldValue::Text("NEW".to_string()),
        };
        let line = diff_line(&diff);
        assert!(line.starts_with("name: \"OLD\" → \"NEW\""));
        assert!(line.contains("forces replacement"));
    }

    #[test]
    fn test_diff_line_in_place() {
        let diff = AttributeDiff {
            field: Field::Comment,
            tracked: FieldValue::Absent,
            desired: FieldValue::Text("c".to_string()),
        };
        assert_eq!(diff_line(&diff), "comment: (unset) → \"c\"");
    }

    #[test]
    fn test_target_prefers_declaration() {
        let change = PlannedChange {
            label: "p".to_string(),
            action: Action::Create,
            data: ResourceData::with_config(PolicyConfig::new("DB", "SCH", "P")),
        };
        assert_eq!(target(&change), "DB.SCH.P");

        let orphan = PlannedChange {
            label: "q".to_string(),
            action: Action::Delete,
            data: ResourceData::from_tracked("DB|SCH|Q".to_string(), None),
        };
        assert_eq!(target(&orphan), "DB|SCH|Q");
    }
}
