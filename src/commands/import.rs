use anyhow::{Context as AnyhowContext, Result, bail};
use policykit::{Client, PolicyConfig, TrackedState};

use super::{Session, load_optional_declarations};
use crate::Context;
use crate::state::StateFile;
use crate::ui;

pub fn run(_ctx: &Context, file: Option<&str>, label: &str, token: &str) -> Result<()> {
    // Declarations only seed unobservable settings here
    let desired = load_optional_declarations(file)?;

    let mut session = Session::open()?;
    let client = session.client()?;

    let tracked = import(
        &client,
        &mut session.state,
        label,
        token,
        desired.get(label).cloned(),
    )?;
    session.save()?;

    ui::success(&format!("Imported {} as '{label}'", tracked.qualified_name()));
    if !desired.contains_key(label) {
        ui::dim(&format!("'{label}' is not declared; the next apply will delete it"));
    }
    Ok(())
}

/// Track the existing policy `token` under `label`
pub fn import(
    client: &Client,
    state: &mut StateFile,
    label: &str,
    token: &str,
    config: Option<PolicyConfig>,
) -> Result<TrackedState> {
    if let Some(entry) = state.policies.get(label) {
        bail!("'{label}' already tracks {}", entry.id);
    }

    let mut data = state.resource(label, config);
    client
        .import(&mut data, token)
        .with_context(|| format!("Failed to import {token}"))?;

    if let Some(id) = data.id()
        && let Some(other) = state.label_for_id(id)
    {
        bail!("{id} is already tracked as '{other}'");
    }

    let tracked = data
        .state()
        .cloned()
        .context("Import produced no tracked attributes")?;
    state.record(label, data);
    Ok(tracked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use policykit::backend::memory::{MemoryBackend, StoredPolicy};
    use crate::commands::declarations_at;
    use policykit::{DetailedSettings, MfaEnrollment, PolicyIdentifier};
    use std::fs;
    use tempfile::TempDir;

    fn backend_with_sales() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.insert(
            PolicyIdentifier::new("SALES", "PUBLIC", "MFA_POLICY").unwrap(),
            StoredPolicy {
                settings: DetailedSettings::default(),
                comment: Some("sso".to_string()),
            },
        );
        backend
    }

    #[test]
    fn test_import_existing() {
        let client = Client::new(backend_with_sales());
        let mut state = StateFile::default();

        let tracked = import(&client, &mut state, "sales", "SALES|PUBLIC|MFA_POLICY", None).unwrap();
        assert_eq!(tracked.qualified_name(), "SALES.PUBLIC.MFA_POLICY");
        assert_eq!(state.policies["sales"].id, "SALES|PUBLIC|MFA_POLICY");
    }

    #[test]
    fn test_import_missing_records_nothing() {
        let client = Client::new(MemoryBackend::new());
        let mut state = StateFile::default();

        let err = import(&client, &mut state, "sales", "SALES|PUBLIC|MFA_POLICY", None).unwrap_err();
        let core = err.downcast_ref::<policykit::Error>().unwrap();
        assert!(core.is_not_found());
        assert!(state.policies.is_empty());
    }

    #[test]
    fn test_import_seeds_declared_settings() {
        let client = Client::new(backend_with_sales());
        let mut state = StateFile::default();
        let mut config = PolicyConfig::new("SALES", "PUBLIC", "MFA_POLICY");
        config.settings.mfa_enrollment = MfaEnrollment::Required;

        let tracked = import(
            &client,
            &mut state,
            "sales",
            "SALES|PUBLIC|MFA_POLICY",
            Some(config),
        )
        .unwrap();
        assert_eq!(
            tracked.settings.unwrap().mfa_enrollment,
            MfaEnrollment::Required
        );
    }

    #[test]
    fn test_import_declarations_reject_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("policies.toml");
        fs::write(
            &path,
            r#"
[policies.sales]
database = "SALES"
schema = "PUBLIC"
name = "MFA_POLICY"
authentication_methods = ["FINGERPRINT"]
"#,
        )
        .unwrap();

        assert!(declarations_at(&path, true).is_err());
        assert!(declarations_at(&path, false).is_err());
    }

    #[test]
    fn test_import_declarations_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("policies.toml");

        assert!(declarations_at(&path, false).unwrap().is_empty());
        assert!(declarations_at(&path, true).is_err());
    }

    #[test]
    fn test_import_rejects_duplicates() {
        let client = Client::new(backend_with_sales());
        let mut state = StateFile::default();
        import(&client, &mut state, "sales", "SALES|PUBLIC|MFA_POLICY", None).unwrap();

        assert!(import(&client, &mut state, "sales", "SALES|PUBLIC|MFA_POLICY", None).is_err());
        assert!(import(&client, &mut state, "again", "SALES|PUBLIC|MFA_POLICY", None).is_err());
        assert_eq!(state.policies.len(), 1);
    }
}
