use anyhow::{Result, bail};
use colored::Colorize;
use policykit::{Field, TrackedState};

use super::Session;
use crate::Context;
use crate::state::{StateFile, TrackedEntry};
use crate::ui;

pub fn run(ctx: &Context, label: Option<&str>) -> Result<()> {
    let session = Session::open()?;
    if ctx.verbose > 0 {
        ui::kv("State", &session.state_path.display().to_string());
    }
    show(&session.state, label)
}

fn show(state: &StateFile, label: Option<&str>) -> Result<()> {
    let entries: Vec<(&String, &TrackedEntry)> = match label {
        Some(label) => match state.policies.get_key_value(label) {
            Some(entry) => vec![entry],
            None => bail!("'{label}' is not tracked"),
        },
        None => state.policies.iter().collect(),
    };

    if entries.is_empty() {
        ui::dim("No policies tracked");
        return Ok(());
    }

    ui::kv(
        "Updated",
        &state.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    for (label, entry) in entries {
        ui::section(label);
        ui::kv("id", &entry.id);
        match &entry.attributes {
            Some(tracked) => {
                for (name, value) in attribute_rows(tracked) {
                    ui::kv(name, &value);
                }
            }
            None => ui::dim(&"attributes unknown; run refresh".yellow().to_string()),
        }
    }
    Ok(())
}

/// Every tracked attribute, in field-table order
fn attribute_rows(tracked: &TrackedState) -> Vec<(&'static str, String)> {
    Field::ALL
        .iter()
        .map(|field| (field.attribute_name(), field.tracked_value(tracked).to_string()))
        .collect()
}
