//! Centralized path resolution for authpol
//!
//! # Environment Variables
//!
//! - `AUTHPOL_CONFIG_DIR` - Override config directory
//! - `AUTHPOL_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `AUTHPOL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/authpol` (if set)
//! 3. `~/.config/authpol`
//!
//! For state_dir():
//! 1. `AUTHPOL_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/authpol` (if set)
//! 3. `~/.local/state/authpol`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "AUTHPOL_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "AUTHPOL_STATE_DIR";

const APP_DIR: &str = "authpol";

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "config.toml";

/// Default policy declarations file name inside the config directory
pub const POLICIES_FILE: &str = "policies.toml";

/// Tracked state file name inside the state directory
pub const STATE_FILE: &str = "state.json";

/// Get the authpol config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the authpol state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Path of the settings file
pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Path of the policy declarations file, honoring an explicit override
pub fn policies_file(override_path: Option<&str>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(expand(path)),
        None => Ok(config_dir()?.join(POLICIES_FILE)),
    }
}

/// Default path of the tracked state file
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(STATE_FILE))
}

/// Expand ~ and environment variables in a path string.
///
/// ```ignore
/// let home_path = paths::expand("~/policies.toml");
/// let var_path = paths::expand("$HOME/policies.toml");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
