use anyhow::Result;
use policykit::{Client, PolicyConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{PoliciesFile, Settings};
use crate::paths;
use crate::state::StateFile;

// Reconciliation
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;

// Inspection
pub mod id;
pub mod show;

/// Settings plus the tracked state they point at
pub struct Session {
    pub settings: Settings,
    pub state_path: PathBuf,
    pub state: StateFile,
}

impl Session {
    /// Load settings and tracked state from their default locations
    pub fn open() -> Result<Self> {
        let settings = Settings::load()?;
        let state_path = settings.state_file()?;
        let state = StateFile::load(&state_path)?;
        Ok(Self {
            settings,
            state_path,
            state,
        })
    }

    /// Client for the configured remote system
    pub fn client(&self) -> Result<Client> {
        Ok(Client::new(self.settings.backend()?))
    }

    /// Stamp and persist tracked state
    pub fn save(&mut self) -> Result<()> {
        self.state.touch(&self.state_path)
    }
}

/// Load declared policies from `--file` or the config directory
pub fn load_declarations(file: Option<&str>) -> Result<BTreeMap<String, PolicyConfig>> {
    let path = paths::policies_file(file)?;
    PoliciesFile::load(&path)
}

/// Load declared policies where they are optional
///
/// Only a missing default file counts as "nothing declared"; an explicit
/// `--file` that is missing, or any file that fails to parse, is an error.
pub fn load_optional_declarations(file: Option<&str>) -> Result<BTreeMap<String, PolicyConfig>> {
    let path = paths::policies_file(file)?;
    declarations_at(&path, file.is_some())
}

fn declarations_at(path: &Path, explicit: bool) -> Result<BTreeMap<String, PolicyConfig>> {
    if !explicit && !path.exists() {
        log::debug!("No declarations at {}", path.display());
        return Ok(BTreeMap::new());
    }
    PoliciesFile::load(path)
}
