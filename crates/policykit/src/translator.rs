//! Desired-state translation into remote create and alter payloads.
//!
//! Both functions are pure; they never talk to a backend.

use crate::diff::{Field, FieldValue, compute_drift};
use crate::error::{Error, Result};
use crate::types::{CreateRequest, PolicyConfig, TrackedState, UpdatePlan, UpdateRequest};

/// Build the create payload for a desired configuration.
///
/// Set-valued attributes are copied verbatim and an absent comment is omitted
/// rather than sent as an empty string.
pub fn build_create_request(config: &PolicyConfig) -> Result<CreateRequest> {
    if config.or_replace && config.if_not_exists {
        return Err(Error::ConflictingCreateFlags);
    }

    Ok(CreateRequest {
        identifier: config.identifier()?,
        or_replace: config.or_replace,
        if_not_exists: config.if_not_exists,
        settings: config.settings.clone(),
        comment: config.comment.clone(),
    })
}

/// Build the alter payload that moves `previous` towards `config`.
///
/// Identity fields are immutable and detailed settings cannot be altered in
/// place yet; both fail loudly instead of being dropped.
pub fn build_update_request(config: &PolicyConfig, previous: &TrackedState) -> Result<UpdatePlan> {
    let mut request = UpdateRequest::default();

    for diff in compute_drift(previous, config) {
        match diff.field {
            field if field.is_identity() => {
                return Err(Error::ImmutableField {
                    field: field.attribute_name(),
                    from: diff.tracked.to_string(),
                    to: diff.desired.to_string(),
                });
            }
            field if field.is_detailed() => {
                return Err(Error::UnsupportedUpdate {
                    field: field.attribute_name(),
                });
            }
            Field::Comment => match diff.desired {
                FieldValue::Text(comment) => request.set_comment = Some(comment),
                _ => request.unset_comment = true,
            },
            field => {
                return Err(Error::UnsupportedUpdate {
                    field: field.attribute_name(),
                });
            }
        }
    }

    if request.is_empty() {
        Ok(UpdatePlan::NoOp)
    } else {
        Ok(UpdatePlan::Alter(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetailedSettings, MfaEnrollment};

    fn settings() -> DetailedSettings {
        DetailedSettings {
            authentication_methods: ["SAML".to_string(), "PASSWORD".to_string()].into(),
            mfa_authentication_methods: ["PASSWORD".to_string()].into(),
            mfa_enrollment: MfaEnrollment::Required,
            client_types: ["ALL".to_string()].into(),
            security_integrations: ["ALL".to_string()].into(),
        }
    }

    #[test]
    fn test_create_request_copies_everything() {
        let mut config = PolicyConfig::new("ANALYTICS", "PUBLIC", "POLICY1")
            .with_settings(settings())
            .with_comment("test");
        config.or_replace = true;

        let request = build_create_request(&config).unwrap();
        assert_eq!(request.identifier.qualified_name(), "ANALYTICS.PUBLIC.POLICY1");
        assert!(request.or_replace);
        assert!(!request.if_not_exists);
        assert_eq!(request.settings, settings());
        assert_eq!(request.comment.as_deref(), Some("test"));
    }

    #[test]
    fn test_create_request_omits_absent_comment() {
        let config = PolicyConfig::new("DB", "SCH", "P");
        let request = build_create_request(&config).unwrap();
        assert_eq!(request.comment, None);
    }

    #[test]
    fn test_create_request_rejects_conflicting_flags() {
        let mut config = PolicyConfig::new("DB", "SCH", "P");
        config.or_replace = true;
        config.if_not_exists = true;
        assert!(matches!(
            build_create_request(&config),
            Err(Error::ConflictingCreateFlags)
        ));
    }

    #[test]
    fn test_create_request_rejects_empty_identity() {
        let config = PolicyConfig::new("DB", "", "P");
        assert!(matches!(
            build_create_request(&config),
            Err(Error::MalformedIdentifierInput { part: "schema" })
        ));
    }

    #[test]
    fn test_update_noop_when_unchanged() {
        let config = PolicyConfig::new("DB", "SCH", "P").with_settings(settings());
        let tracked = TrackedState::seeded_from(&config);
        assert_eq!(build_update_request(&config, &tracked).unwrap(), UpdatePlan::NoOp);
    }

    #[test]
    fn test_update_ignores_idempotency_flags() {
        let config = PolicyConfig::new("DB", "SCH", "P");
        let mut tracked = TrackedState::seeded_from(&config);
        tracked.or_replace = true;
        tracked.if_not_exists = true;
        assert_eq!(build_update_request(&config, &tracked).unwrap(), UpdatePlan::NoOp);
    }

    #[test]
    fn test_update_sets_comment() {
        let previous = TrackedState::seeded_from(&PolicyConfig::new("DB", "SCH", "P"));
        let config = PolicyConfig::new("DB", "SCH", "P").with_comment("new");

        let plan = build_update_request(&config, &previous).unwrap();
        assert_eq!(
            plan,
            UpdatePlan::Alter(UpdateRequest {
                set_comment: Some("new".to_string()),
                unset_comment: false,
            })
        );
    }

    #[test]
    fn test_update_unsets_comment() {
        let previous =
            TrackedState::seeded_from(&PolicyConfig::new("DB", "SCH", "P").with_comment("old"));
        let config = PolicyConfig::new("DB", "SCH", "P");

        let plan = build_update_request(&config, &previous).unwrap();
        assert_eq!(
            plan,
            UpdatePlan::Alter(UpdateRequest {
                set_comment: None,
                unset_comment: true,
            })
        );
    }

    #[test]
    fn test_update_rejects_rename() {
        let previous = TrackedState::seeded_from(&PolicyConfig::new("DB", "SCH", "OLD"));
        let config = PolicyConfig::new("DB", "SCH", "NEW");

        match build_update_request(&config, &previous) {
            Err(Error::ImmutableField { field, from, to }) => {
                assert_eq!(field, "name");
                assert_eq!(from, "\"OLD\"");
                assert_eq!(to, "\"NEW\"");
            }
            other => panic!("expected ImmutableField, got {other:?}"),
        }
    }

    #[test]
    fn test_update_rejects_detailed_settings() {
        let previous = TrackedState::seeded_from(&PolicyConfig::new("DB", "SCH", "P"));
        let config = PolicyConfig::new("DB", "SCH", "P").with_settings(settings());

        match build_update_request(&config, &previous) {
            Err(Error::UnsupportedUpdate { field }) => {
                assert_eq!(field, "authentication_methods");
            }
            other => panic!("expected UnsupportedUpdate, got {other:?}"),
        }
    }
}
