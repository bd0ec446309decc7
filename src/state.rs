use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use policykit::{PolicyConfig, ResourceData, TrackedState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

/// Tracked state of every managed policy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    /// Tracked policies, keyed by declaration label
    #[serde(default)]
    pub policies: BTreeMap<String, TrackedEntry>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// Tracked key and attributes of one policy
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    /// Identifier token (`database|schema|name`)
    pub id: String,

    /// Attributes as of the last read
    #[serde(default)]
    pub attributes: Option<TrackedState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            policies: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Load state from disk, or return default if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    // ========================================================================
    // Slot Helpers
    // ========================================================================

    /// Build the lifecycle slot for `label`, paired with its declaration
    pub fn resource(&self, label: &str, config: Option<PolicyConfig>) -> ResourceData {
        let mut data = match self.policies.get(label) {
            Some(entry) => ResourceData::from_tracked(entry.id.clone(), entry.attributes.clone()),
            None => ResourceData::new(),
        };
        data.set_config(config);
        data
    }

    /// Store the outcome of a lifecycle verb; an untracked slot drops the entry
    pub fn record(&mut self, label: &str, data: ResourceData) {
        match data.into_tracked() {
            (Some(id), attributes) => {
                self.policies
                    .insert(label.to_string(), TrackedEntry { id, attributes });
            }
            (None, _) => {
                if self.policies.remove(label).is_some() {
                    log::debug!("Dropped '{label}' from tracked state");
                }
            }
        }
    }

    /// Label already tracking the policy with token `id`, if any
    pub fn label_for_id(&self, id: &str) -> Option<&str> {
        self.policies
            .iter()
            .find(|(_, entry)| entry.id == id)
            .map(|(label, _)| label.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracked_data() -> ResourceData {
        let config = PolicyConfig::new("ANALYTICS", "PUBLIC", "POLICY1").with_comment("test");
        ResourceData::from_tracked(
            "ANALYTICS|PUBLIC|POLICY1".to_string(),
            Some(TrackedState::seeded_from(&config)),
        )
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::load(&temp.path().join("state.json")).unwrap();
        assert!(state.policies.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("state.json");

        let mut state = StateFile::default();
        state.record("analytics", tracked_data());
        state.touch(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.policies, state.policies);
        let entry = &loaded.policies["analytics"];
        assert_eq!(entry.id, "ANALYTICS|PUBLIC|POLICY1");
        assert_eq!(
            entry.attributes.as_ref().unwrap().comment.as_deref(),
            Some("test")
        );
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(StateFile::load(&path).is_err());
    }

    #[test]
    fn test_record_untracked_removes_entry() {
        let mut state = StateFile::default();
        state.record("analytics", tracked_data());

        let mut data = state.resource("analytics", None);
        assert_eq!(data.id(), Some("ANALYTICS|PUBLIC|POLICY1"));
        data.clear_id();
        state.record("analytics", data);

        assert!(state.policies.is_empty());
    }

    #[test]
    fn test_resource_pairs_config() {
        let state = StateFile::default();
        let config = PolicyConfig::new("DB", "SCH", "P");
        let data = state.resource("new", Some(config.clone()));
        assert!(!data.is_tracked());
        assert_eq!(data.config(), Some(&config));
    }

    #[test]
    fn test_label_for_id() {
        let mut state = StateFile::default();
        state.record("analytics", tracked_data());
        assert_eq!(
            state.label_for_id("ANALYTICS|PUBLIC|POLICY1"),
            Some("analytics")
        );
        assert_eq!(state.label_for_id("X|Y|Z"), None);
    }
}
