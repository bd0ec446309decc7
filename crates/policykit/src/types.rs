//! Core types for authentication policy management.

use crate::error::{Error, Result};
use crate::identifier::PolicyIdentifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Whether users must enroll in multi-factor authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MfaEnrollment {
    /// Enrollment is offered but not enforced
    #[default]
    #[serde(alias = "optional")]
    Optional,
    /// Users must enroll before logging in
    #[serde(alias = "required")]
    Required,
}

impl MfaEnrollment {
    /// Wire/display form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optional => "OPTIONAL",
            Self::Required => "REQUIRED",
        }
    }
}

impl fmt::Display for MfaEnrollment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MfaEnrollment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optional" => Ok(Self::Optional),
            "required" => Ok(Self::Required),
            _ => Err(Error::InvalidValue {
                field: "mfa_enrollment",
                value: s.to_string(),
            }),
        }
    }
}

/// Fine-grained policy settings.
///
/// These are only observable through the remote `describe` call, which not
/// every backend offers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedSettings {
    /// Authentication methods allowed during login
    #[serde(default)]
    pub authentication_methods: BTreeSet<String>,
    /// Authentication methods that enforce MFA
    #[serde(default)]
    pub mfa_authentication_methods: BTreeSet<String>,
    /// MFA enrollment mode
    #[serde(default)]
    pub mfa_enrollment: MfaEnrollment,
    /// Clients allowed to authenticate
    #[serde(default)]
    pub client_types: BTreeSet<String>,
    /// Security integrations the policy is associated with
    #[serde(default)]
    pub security_integrations: BTreeSet<String>,
}

/// Desired configuration of one policy, as declared by the user.
///
/// Values arrive here already validated and defaulted by the configuration
/// layer; nothing in this crate distinguishes a default from an explicit value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Database the policy lives in
    pub database: String,
    /// Schema the policy lives in
    pub schema: String,
    /// Policy name within the schema
    pub name: String,
    /// Replace an existing policy with the same name at creation time
    #[serde(default)]
    pub or_replace: bool,
    /// Succeed without changes if the policy already exists at creation time
    #[serde(default)]
    pub if_not_exists: bool,
    /// Fine-grained settings sent at creation time
    #[serde(flatten)]
    pub settings: DetailedSettings,
    /// Free-text comment; `None` leaves it unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl PolicyConfig {
    /// Create a config with empty settings.
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
            or_replace: false,
            if_not_exists: false,
            settings: DetailedSettings::default(),
            comment: None,
        }
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the detailed settings.
    pub fn with_settings(mut self, settings: DetailedSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The identifier this configuration declares.
    pub fn identifier(&self) -> Result<PolicyIdentifier> {
        PolicyIdentifier::new(&self.database, &self.schema, &self.name)
    }
}

/// What the remote system reports for a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePolicy {
    /// Database reported by the remote system
    pub database_name: String,
    /// Schema reported by the remote system
    pub schema_name: String,
    /// Policy name reported by the remote system
    pub name: String,
    /// Current comment, if any
    #[serde(default)]
    pub comment: Option<String>,
    /// Owning role
    #[serde(default)]
    pub owner: Option<String>,
    /// Creation timestamp, as reported
    #[serde(default)]
    pub created_on: Option<String>,
}

/// Locally tracked projection of a policy, used for drift detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedState {
    /// Database of the tracked policy
    pub database: String,
    /// Schema of the tracked policy
    pub schema: String,
    /// Name of the tracked policy
    pub name: String,
    /// `or_replace` as declared when the policy was created
    #[serde(default)]
    pub or_replace: bool,
    /// `if_not_exists` as declared when the policy was created
    #[serde(default)]
    pub if_not_exists: bool,
    /// Detailed settings, or `None` while they have never been declared
    /// nor observed through describe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<DetailedSettings>,
    /// Comment as last read
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    qualified_name: String,
}

impl TrackedState {
    /// Seed tracked state from a desired configuration.
    ///
    /// The qualified name stays empty until the next read projects remote state.
    pub fn seeded_from(config: &PolicyConfig) -> Self {
        Self {
            database: config.database.clone(),
            schema: config.schema.clone(),
            name: config.name.clone(),
            or_replace: config.or_replace,
            if_not_exists: config.if_not_exists,
            settings: Some(config.settings.clone()),
            comment: config.comment.clone(),
            qualified_name: String::new(),
        }
    }

    /// Seed tracked state for an identifier with nothing else known.
    ///
    /// Detailed settings stay unknown so they are never compared against a
    /// declaration until describe has reported them.
    pub fn seeded_for(id: &PolicyIdentifier) -> Self {
        Self {
            database: id.database().to_string(),
            schema: id.schema().to_string(),
            name: id.name().to_string(),
            or_replace: false,
            if_not_exists: false,
            settings: None,
            comment: None,
            qualified_name: String::new(),
        }
    }

    /// Fully qualified name, derived from the identifier on every read.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub(crate) fn set_qualified_name(&mut self, id: &PolicyIdentifier) {
        self.qualified_name = id.qualified_name();
    }
}

/// Payload for the remote create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    /// Policy to create
    pub identifier: PolicyIdentifier,
    /// Overwrite an existing policy of the same name
    pub or_replace: bool,
    /// Leave an existing policy of the same name alone
    pub if_not_exists: bool,
    /// Settings copied verbatim from the declaration
    pub settings: DetailedSettings,
    /// `None` means "omit", never "set to empty"
    pub comment: Option<String>,
}

/// Payload for the remote alter call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// New comment to set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_comment: Option<String>,
    /// Remove the comment
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unset_comment: bool,
}

impl UpdateRequest {
    /// Whether the request changes nothing.
    pub fn is_empty(&self) -> bool {
        self.set_comment.is_none() && !self.unset_comment
    }
}

/// Outcome of translating a desired configuration into an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Nothing to send to the remote system
    NoOp,
    /// Send this alter request
    Alter(UpdateRequest),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mfa_enrollment_parse() {
        assert_eq!("optional".parse::<MfaEnrollment>().unwrap(), MfaEnrollment::Optional);
        assert_eq!("REQUIRED".parse::<MfaEnrollment>().unwrap(), MfaEnrollment::Required);
        assert!("sometimes".parse::<MfaEnrollment>().is_err());
    }

    #[test]
    fn test_mfa_enrollment_serde_accepts_both_cases() {
        let upper: MfaEnrollment = serde_json::from_str("\"REQUIRED\"").unwrap();
        let lower: MfaEnrollment = serde_json::from_str("\"required\"").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(serde_json::to_string(&upper).unwrap(), "\"REQUIRED\"");
    }

    #[test]
    fn test_tracked_state_serialization() {
        let config = PolicyConfig::new("DB", "SCH", "P").with_comment("hello");
        let mut tracked = TrackedState::seeded_from(&config);
        tracked.set_qualified_name(&config.identifier().unwrap());

        let json = serde_json::to_string(&tracked).unwrap();
        let back: TrackedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tracked);
        assert_eq!(back.qualified_name(), "DB.SCH.P");
    }

    #[test]
    fn test_seeded_state_has_no_qualified_name() {
        let config = PolicyConfig::new("DB", "SCH", "P");
        assert_eq!(TrackedState::seeded_from(&config).qualified_name(), "");
    }

    #[test]
    fn test_seeded_for_leaves_settings_unknown() {
        let id = PolicyIdentifier::new("DB", "SCH", "P").unwrap();
        let tracked = TrackedState::seeded_for(&id);
        assert_eq!(tracked.settings, None);

        let json = serde_json::to_value(&tracked).unwrap();
        assert!(json.get("settings").is_none());
        let back: TrackedState = serde_json::from_value(json).unwrap();
        assert_eq!(back.settings, None);
    }

    #[test]
    fn test_update_request_empty() {
        assert!(UpdateRequest::default().is_empty());
        assert!(
            !UpdateRequest {
                unset_comment: true,
                ..Default::default()
            }
            .is_empty()
        );
    }
}
