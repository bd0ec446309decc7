//! Attribute-level drift between desired configuration and tracked state.
//!
//! Attributes are addressed through the static [`Field`] table. The table is
//! also where diff suppression lives: `or_replace` and `if_not_exists` only
//! shape the create call, so whatever value was recorded for them is accepted
//! regardless of what is declared now.

use crate::error::Error;
use crate::types::{DetailedSettings, PolicyConfig, TrackedState};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Every attribute of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Database part of the identifier
    Database,
    /// Schema part of the identifier
    Schema,
    /// Name part of the identifier
    Name,
    /// Create-time overwrite flag
    OrReplace,
    /// Create-time tolerate-existing flag
    IfNotExists,
    /// Allowed login methods
    AuthenticationMethods,
    /// Login methods that enforce MFA
    MfaAuthenticationMethods,
    /// MFA enrollment mode
    MfaEnrollment,
    /// Allowed clients
    ClientTypes,
    /// Associated security integrations
    SecurityIntegrations,
    /// Free-text comment
    Comment,
    /// `DB.SCHEMA.NAME`, computed
    QualifiedName,
}

impl Field {
    /// All fields, identity first.
    pub const ALL: [Field; 12] = [
        Field::Database,
        Field::Schema,
        Field::Name,
        Field::OrReplace,
        Field::IfNotExists,
        Field::AuthenticationMethods,
        Field::MfaAuthenticationMethods,
        Field::MfaEnrollment,
        Field::ClientTypes,
        Field::SecurityIntegrations,
        Field::Comment,
        Field::QualifiedName,
    ];

    /// Attribute name as used in configuration files and error messages.
    pub fn attribute_name(&self) -> &'static str {
        match self {
            Field::Database => "database",
            Field::Schema => "schema",
            Field::Name => "name",
            Field::OrReplace => "or_replace",
            Field::IfNotExists => "if_not_exists",
            Field::AuthenticationMethods => "authentication_methods",
            Field::MfaAuthenticationMethods => "mfa_authentication_methods",
            Field::MfaEnrollment => "mfa_enrollment",
            Field::ClientTypes => "client_types",
            Field::SecurityIntegrations => "security_integrations",
            Field::Comment => "comment",
            Field::QualifiedName => "qualified_name",
        }
    }

    /// Part of the identifier; a change forces replacement.
    pub fn is_identity(&self) -> bool {
        matches!(self, Field::Database | Field::Schema | Field::Name)
    }

    /// Never reported as drift.
    pub fn suppresses_diff(&self) -> bool {
        matches!(self, Field::OrReplace | Field::IfNotExists)
    }

    /// Only observable through the remote describe call.
    pub fn is_detailed(&self) -> bool {
        matches!(
            self,
            Field::AuthenticationMethods
                | Field::MfaAuthenticationMethods
                | Field::MfaEnrollment
                | Field::ClientTypes
                | Field::SecurityIntegrations
        )
    }

    /// Derived from the identifier, read-only.
    pub fn is_computed(&self) -> bool {
        matches!(self, Field::QualifiedName)
    }

    /// Value declared in the desired configuration (`None` for computed fields).
    pub fn desired_value(&self, config: &PolicyConfig) -> Option<FieldValue> {
        let value = match self {
            Field::Database => FieldValue::Text(config.database.clone()),
            Field::Schema => FieldValue::Text(config.schema.clone()),
            Field::Name => FieldValue::Text(config.name.clone()),
            Field::OrReplace => FieldValue::Flag(config.or_replace),
            Field::IfNotExists => FieldValue::Flag(config.if_not_exists),
            Field::Comment => FieldValue::from(config.comment.clone()),
            Field::QualifiedName => return None,
            detailed => detailed.settings_value(&config.settings),
        };
        Some(value)
    }

    /// Value recorded in tracked state.
    ///
    /// Detailed settings that were never declared nor observed are
    /// [`FieldValue::Unknown`].
    pub fn tracked_value(&self, tracked: &TrackedState) -> FieldValue {
        match self {
            Field::Database => FieldValue::Text(tracked.database.clone()),
            Field::Schema => FieldValue::Text(tracked.schema.clone()),
            Field::Name => FieldValue::Text(tracked.name.clone()),
            Field::OrReplace => FieldValue::Flag(tracked.or_replace),
            Field::IfNotExists => FieldValue::Flag(tracked.if_not_exists),
            Field::Comment => FieldValue::from(tracked.comment.clone()),
            Field::QualifiedName => FieldValue::Text(tracked.qualified_name().to_string()),
            detailed => tracked
                .settings
                .as_ref()
                .map_or(FieldValue::Unknown, |settings| detailed.settings_value(settings)),
        }
    }

    fn settings_value(&self, settings: &DetailedSettings) -> FieldValue {
        match self {
            Field::AuthenticationMethods => FieldValue::Set(settings.authentication_methods.clone()),
            Field::MfaAuthenticationMethods => {
                FieldValue::Set(settings.mfa_authentication_methods.clone())
            }
            Field::MfaEnrollment => FieldValue::Text(settings.mfa_enrollment.to_string()),
            Field::ClientTypes => FieldValue::Set(settings.client_types.clone()),
            Field::SecurityIntegrations => FieldValue::Set(settings.security_integrations.clone()),
            _ => FieldValue::Unknown,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.attribute_name() == s)
            .ok_or_else(|| Error::InvalidValue {
                field: "attribute",
                value: s.to_string(),
            })
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Scalar string
    Text(String),
    /// Boolean flag
    Flag(bool),
    /// Unordered set of strings
    Set(BTreeSet<String>),
    /// Explicitly unset
    Absent,
    /// Never observed; not comparable
    Unknown,
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(FieldValue::Absent, FieldValue::Text)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Set(items) => {
                let joined: Vec<&str> = items.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(", "))
            }
            FieldValue::Absent => f.write_str("(unset)"),
            FieldValue::Unknown => f.write_str("(unknown)"),
        }
    }
}

/// Drift on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDiff {
    /// Attribute that drifted
    pub field: Field,
    /// Value in tracked state
    pub tracked: FieldValue,
    /// Value in the declaration
    pub desired: FieldValue,
}

impl AttributeDiff {
    /// Whether resolving this drift needs destroy-then-create.
    pub fn requires_replacement(&self) -> bool {
        self.field.is_identity()
    }
}

/// Compare tracked state with the desired configuration.
///
/// Computed fields, diff-suppressed fields and fields whose tracked value is
/// unknown are never reported.
pub fn compute_drift(tracked: &TrackedState, desired: &PolicyConfig) -> Vec<AttributeDiff> {
    Field::ALL
        .into_iter()
        .filter(|field| !field.suppresses_diff())
        .filter_map(|field| {
            let desired_value = field.desired_value(desired)?;
            let tracked_value = field.tracked_value(tracked);
            let comparable = tracked_value != FieldValue::Unknown;
            (comparable && desired_value != tracked_value).then_some(AttributeDiff {
                field,
                tracked: tracked_value,
                desired: desired_value,
            })
        })
        .collect()
}

/// Whether any drift in the list forces replacement.
pub fn requires_replacement(diffs: &[AttributeDiff]) -> bool {
    diffs.iter().any(AttributeDiff::requires_replacement)
}
