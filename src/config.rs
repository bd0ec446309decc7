//! Settings and policy declarations.
//!
//! `config.toml` holds tool settings (remote endpoint, state location).
//! `policies.toml` declares the desired policies, one `[policies.<label>]`
//! table each:
//!
//! ```toml
//! [policies.analytics]
//! database = "ANALYTICS"
//! schema = "PUBLIC"
//! name = "POLICY1"
//! client_types = ["snowflake_ui", "snowsql"]
//! comment = "test"
//! ```

use anyhow::{Context, Result, bail};
use policykit::backend::http::HttpBackend;
use policykit::{DetailedSettings, MfaEnrollment, PolicyConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Allowed authentication methods
pub const AUTHENTICATION_METHODS: &[&str] = &["ALL", "SAML", "PASSWORD", "OAUTH", "KEYPAIR"];

/// Allowed methods that enforce MFA
pub const MFA_AUTHENTICATION_METHODS: &[&str] = &["ALL", "SAML", "PASSWORD"];

/// Allowed client types
pub const CLIENT_TYPES: &[&str] = &["ALL", "SNOWFLAKE_UI", "DRIVERS", "SNOWSQL"];

// ============================================================================
// Settings
// ============================================================================

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub state: StateSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Base URL of the control-plane API
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
    /// Whether the server implements the describe endpoint
    pub detailed_describe: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            token_env: "AUTHPOL_TOKEN".to_string(),
            timeout_secs: 30,
            detailed_describe: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// Override for the tracked state file location
    pub path: Option<String>,
}

impl Settings {
    /// Load settings from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    /// Load settings from an explicit path, or defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolved tracked state file location
    pub fn state_file(&self) -> Result<PathBuf> {
        match &self.state.path {
            Some(path) => Ok(paths::expand(path)),
            None => paths::state_file(),
        }
    }

    /// Build the HTTP backend described by `[remote]`
    pub fn backend(&self) -> Result<HttpBackend> {
        let endpoint = self.remote.endpoint.as_deref().with_context(|| {
            format!(
                "No remote endpoint configured; set [remote] endpoint in {}",
                paths::SETTINGS_FILE
            )
        })?;

        let mut backend =
            HttpBackend::with_timeout(endpoint, Duration::from_secs(self.remote.timeout_secs))
                .with_detailed_describe(self.remote.detailed_describe);

        match std::env::var(&self.remote.token_env) {
            Ok(token) if !token.is_empty() => backend = backend.with_token(token),
            _ => log::debug!(
                "{} is not set; sending unauthenticated requests",
                self.remote.token_env
            ),
        }
        Ok(backend)
    }
}

// ============================================================================
// Policy declarations
// ============================================================================

/// Contents of `policies.toml`
#[derive(Debug, Default, Deserialize)]
pub struct PoliciesFile {
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyDecl>,
}

/// One declared policy as written by the user
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDecl {
    pub database: String,
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub or_replace: bool,
    #[serde(default)]
    pub if_not_exists: bool,
    #[serde(default = "default_all")]
    pub authentication_methods: Vec<String>,
    #[serde(default)]
    pub mfa_authentication_methods: Vec<String>,
    #[serde(default = "default_mfa_enrollment")]
    pub mfa_enrollment: String,
    #[serde(default = "default_all")]
    pub client_types: Vec<String>,
    #[serde(default = "default_all")]
    pub security_integrations: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_all() -> Vec<String> {
    vec!["ALL".to_string()]
}

fn default_mfa_enrollment() -> String {
    "optional".to_string()
}

impl PoliciesFile {
    /// Load and validate declarations, keyed by label
    pub fn load(path: &Path) -> Result<BTreeMap<String, PolicyConfig>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let file: PoliciesFile = toml::from_str(&content)
            .with_context(|| format!("Invalid policy declarations in {}", path.display()))?;

        log::debug!(
            "Loaded {} policy declarations from {}",
            file.policies.len(),
            path.display()
        );
        file.into_configs()
    }

    fn into_configs(self) -> Result<BTreeMap<String, PolicyConfig>> {
        let mut configs = BTreeMap::new();
        let mut seen = BTreeMap::new();

        for (label, decl) in self.policies {
            let config = decl
                .into_config()
                .with_context(|| format!("Invalid policy '{label}'"))?;
            let id = config
                .identifier()
                .with_context(|| format!("Invalid policy '{label}'"))?;
            if let Some(other) = seen.insert(id.clone(), label.clone()) {
                bail!("Policies '{other}' and '{label}' both declare {id}");
            }
            configs.insert(label, config);
        }
        Ok(configs)
    }
}

impl PolicyDecl {
    /// Validate vocabularies and normalize to a [`PolicyConfig`]
    pub fn into_config(self) -> Result<PolicyConfig> {
        let settings = DetailedSettings {
            authentication_methods: normalize(
                "authentication_methods",
                &self.authentication_methods,
                Some(AUTHENTICATION_METHODS),
            )?,
            mfa_authentication_methods: normalize(
                "mfa_authentication_methods",
                &self.mfa_authentication_methods,
                Some(MFA_AUTHENTICATION_METHODS),
            )?,
            mfa_enrollment: self.mfa_enrollment.parse::<MfaEnrollment>()?,
            client_types: normalize("client_types", &self.client_types, Some(CLIENT_TYPES))?,
            security_integrations: normalize(
                "security_integrations",
                &self.security_integrations,
                None,
            )?,
        };

        let mut config =
            PolicyConfig::new(self.database, self.schema, self.name).with_settings(settings);
        config.or_replace = self.or_replace;
        config.if_not_exists = self.if_not_exists;
        config.comment = self.comment;
        Ok(config)
    }
}

/// Upper-case every value and check it against `allowed`, if given
fn normalize(
    field: &str,
    values: &[String],
    allowed: Option<&[&str]>,
) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for value in values {
        let upper = value.trim().to_uppercase();
        if upper.is_empty() {
            bail!("{field} contains an empty value");
        }
        if let Some(allowed) = allowed
            && !allowed.contains(&upper.as_str())
        {
            bail!(
                "{field}: '{value}' is not one of {}",
                allowed.join(", ").to_lowercase()
            );
        }
        set.insert(upper);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(toml_str: &str) -> Result<BTreeMap<String, PolicyConfig>> {
        let file: PoliciesFile = toml::from_str(toml_str)?;
        file.into_configs()
    }

    #[test]
    fn test_defaults_applied() {
        let configs = parse(
            r#"
            [policies.analytics]
            database = "ANALYTICS"
            schema = "PUBLIC"
            name = "POLICY1"
            "#,
        )
        .unwrap();

        let config = &configs["analytics"];
        let all: BTreeSet<String> = ["ALL".to_string()].into();
        assert_eq!(config.settings.authentication_methods, all);
        assert_eq!(config.settings.client_types, all);
        assert_eq!(config.settings.security_integrations, all);
        assert!(config.settings.mfa_authentication_methods.is_empty());
        assert_eq!(config.settings.mfa_enrollment, MfaEnrollment::Optional);
        assert!(!config.or_replace);
        assert_eq!(config.comment, None);
    }

    #[test]
    fn test_values_normalized() {
        let configs = parse(
            r#"
            [policies.sales]
            database = "SALES"
            schema = "PUBLIC"
            name = "MFA_POLICY"
            authentication_methods = ["saml", "Password"]
            mfa_enrollment = "Required"
            client_types = ["snowflake_ui"]
            security_integrations = ["okta_int"]
            comment = "sso only"
            "#,
        )
        .unwrap();

        let settings = &configs["sales"].settings;
        assert!(settings.authentication_methods.contains("SAML"));
        assert!(settings.authentication_methods.contains("PASSWORD"));
        assert_eq!(settings.mfa_enrollment, MfaEnrollment::Required);
        assert!(settings.security_integrations.contains("OKTA_INT"));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = parse(
            r#"
            [policies.bad]
            database = "DB"
            schema = "SCH"
            name = "P"
            authentication_methods = ["magic"]
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("magic"));
    }

    #[test]
    fn test_oauth_not_allowed_for_mfa() {
        assert!(
            parse(
                r#"
                [policies.bad]
                database = "DB"
                schema = "SCH"
                name = "P"
                mfa_authentication_methods = ["oauth"]
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_bad_enrollment_rejected() {
        assert!(
            parse(
                r#"
                [policies.bad]
                database = "DB"
                schema = "SCH"
                name = "P"
                mfa_enrollment = "sometimes"
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_empty_identity_rejected() {
        assert!(
            parse(
                r#"
                [policies.bad]
                database = ""
                schema = "SCH"
                name = "P"
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let err = parse(
            r#"
            [policies.one]
            database = "DB"
            schema = "SCH"
            name = "P"

            [policies.two]
            database = "DB"
            schema = "SCH"
            name = "P"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both declare"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(
            parse(
                r#"
                [policies.bad]
                database = "DB"
                schema = "SCH"
                name = "P"
                qualified_name = "DB.SCH.P"
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_settings_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("config.toml")).unwrap();
        assert_eq!(settings.remote.endpoint, None);
        assert_eq!(settings.remote.timeout_secs, 30);
        assert_eq!(settings.remote.token_env, "AUTHPOL_TOKEN");
        assert!(settings.backend().is_err());
    }

    #[test]
    fn test_settings_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [remote]
            endpoint = "https://control.example.com/api/v2"
            detailed_describe = true

            [state]
            path = "/var/lib/authpol/state.json"
            "#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(
            settings.state_file().unwrap(),
            PathBuf::from("/var/lib/authpol/state.json")
        );
        let backend = settings.backend().unwrap();
        assert_eq!(backend.api_base(), "https://control.example.com/api/v2");
        assert!(policykit::backend::Backend::supports_detailed_describe(
            &backend
        ));
    }

    #[test]
    fn test_policies_file_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("policies.toml");
        fs::write(
            &path,
            "[policies.p]\ndatabase = \"DB\"\nschema = \"SCH\"\nname = \"P\"\n",
        )
        .unwrap();

        let configs = PoliciesFile::load(&path).unwrap();
        assert_eq!(configs.len(), 1);
        assert!(PoliciesFile::load(&temp.path().join("missing.toml")).is_err());
    }
}
