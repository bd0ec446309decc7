//! In-process control plane.
//!
//! Behaves like the remote system for the purposes of lifecycle code:
//! `or_replace` overwrites, `if_not_exists` tolerates an existing object,
//! both together are rejected, and a missing object is [`Error::NotFound`].
//! Every call is recorded so tests can assert on the exact remote traffic.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::identifier::PolicyIdentifier;
use crate::types::{CreateRequest, DetailedSettings, RemotePolicy, UpdateRequest};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// A policy as stored by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPolicy {
    /// Fine-grained settings
    pub settings: DetailedSettings,
    /// Free-text comment
    pub comment: Option<String>,
}

/// A call received by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `create`
    Create(PolicyIdentifier),
    /// `show_by_identifier`
    Show(PolicyIdentifier),
    /// `alter`
    Alter(PolicyIdentifier),
    /// `delete`
    Delete(PolicyIdentifier),
    /// `describe`
    Describe(PolicyIdentifier),
}

#[derive(Debug, Default)]
struct Inner {
    policies: BTreeMap<PolicyIdentifier, StoredPolicy>,
    calls: Vec<Call>,
    fail_next: Option<(usize, String)>,
}

/// In-memory [`Backend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    detailed_describe: bool,
}

impl MemoryBackend {
    /// Create an empty backend without describe support.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend that answers describe calls.
    pub fn with_detailed_describe() -> Self {
        Self {
            detailed_describe: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Store a policy directly, bypassing create semantics.
    pub fn insert(&self, id: PolicyIdentifier, policy: StoredPolicy) {
        self.lock().policies.insert(id, policy);
    }

    /// Remove a policy directly, simulating an out-of-band drop.
    pub fn remove(&self, id: &PolicyIdentifier) -> Option<StoredPolicy> {
        self.lock().policies.remove(id)
    }

    /// Look up a stored policy.
    pub fn get(&self, id: &PolicyIdentifier) -> Option<StoredPolicy> {
        self.lock().policies.get(id).cloned()
    }

    /// Number of stored policies.
    pub fn len(&self) -> usize {
        self.lock().policies.len()
    }

    /// Whether no policies are stored.
    pub fn is_empty(&self) -> bool {
        self.lock().policies.is_empty()
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Make the next call fail with a remote error carrying `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.fail_after(0, message);
    }

    /// Let `calls` more calls succeed, then fail the one after.
    pub fn fail_after(&self, calls: usize, message: impl Into<String>) {
        self.lock().fail_next = Some((calls, message.into()));
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(call);
        match inner.fail_next.take() {
            Some((0, message)) => return Err(Error::remote(operation, None, message)),
            Some((remaining, message)) => inner.fail_next = Some((remaining - 1, message)),
            None => {}
        }
        Ok(inner)
    }
}

fn not_found(id: &PolicyIdentifier) -> Error {
    Error::NotFound {
        identifier: id.qualified_name(),
    }
}

impl Backend for MemoryBackend {
    fn create(&self, request: &CreateRequest) -> Result<()> {
        let id = &request.identifier;
        let mut inner = self.record(Call::Create(id.clone()), "create")?;

        if request.or_replace && request.if_not_exists {
            return Err(Error::remote(
                "create",
                None,
                "OR REPLACE and IF NOT EXISTS are incompatible",
            ));
        }
        if inner.policies.contains_key(id) {
            if request.if_not_exists {
                return Ok(());
            }
            if !request.or_replace {
                return Err(Error::remote(
                    "create",
                    None,
                    format!("Object '{id}' already exists."),
                ));
            }
        }

        inner.policies.insert(
            id.clone(),
            StoredPolicy {
                settings: request.settings.clone(),
                comment: request.comment.clone(),
            },
        );
        Ok(())
    }

    fn show_by_identifier(&self, id: &PolicyIdentifier) -> Result<RemotePolicy> {
        let inner = self.record(Call::Show(id.clone()), "show")?;
        let policy = inner.policies.get(id).ok_or_else(|| not_found(id))?;

        Ok(RemotePolicy {
            database_name: id.database().to_string(),
            schema_name: id.schema().to_string(),
            name: id.name().to_string(),
            comment: policy.comment.clone(),
            owner: Some("ACCOUNTADMIN".to_string()),
            created_on: None,
        })
    }

    fn alter(&self, id: &PolicyIdentifier, request: &UpdateRequest) -> Result<()> {
        let mut inner = self.record(Call::Alter(id.clone()), "alter")?;
        let policy = inner.policies.get_mut(id).ok_or_else(|| not_found(id))?;

        if let Some(comment) = &request.set_comment {
            policy.comment = Some(comment.clone());
        }
        if request.unset_comment {
            policy.comment = None;
        }
        Ok(())
    }

    fn delete(&self, id: &PolicyIdentifier) -> Result<()> {
        let mut inner = self.record(Call::Delete(id.clone()), "delete")?;
        inner.policies.remove(id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    fn supports_detailed_describe(&self) -> bool {
        self.detailed_describe
    }

    fn describe(&self, id: &PolicyIdentifier) -> Result<DetailedSettings> {
        if !self.detailed_describe {
            return Err(Error::remote("describe", None, "describe is not available"));
        }
        let inner = self.record(Call::Describe(id.clone()), "describe")?;
        inner
            .policies
            .get(id)
            .map(|p| p.settings.clone())
            .ok_or_else(|| not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> CreateRequest {
        CreateRequest {
            identifier: PolicyIdentifier::new("DB", "SCH", name).unwrap(),
            or_replace: false,
            if_not_exists: false,
            settings: DetailedSettings::default(),
            comment: Some("first".to_string()),
        }
    }

    #[test]
    fn test_create_and_show() {
        let backend = MemoryBackend::new();
        let req = request("P");
        backend.create(&req).unwrap();

        let shown = backend.show_by_identifier(&req.identifier).unwrap();
        assert_eq!(shown.name, "P");
        assert_eq!(shown.comment.as_deref(), Some("first"));
    }

    #[test]
    fn test_create_existing_fails_without_flags() {
        let backend = MemoryBackend::new();
        backend.create(&request("P")).unwrap();
        let err = backend.create(&request("P")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_create_if_not_exists_keeps_existing() {
        let backend = MemoryBackend::new();
        backend.create(&request("P")).unwrap();

        let mut again = request("P");
        again.if_not_exists = true;
        again.comment = Some("second".to_string());
        backend.create(&again).unwrap();

        let stored = backend.get(&again.identifier).unwrap();
        assert_eq!(stored.comment.as_deref(), Some("first"));
    }

    #[test]
    fn test_create_or_replace_overwrites() {
        let backend = MemoryBackend::new();
        backend.create(&request("P")).unwrap();

        let mut again = request("P");
        again.or_replace = true;
        again.comment = None;
        backend.create(&again).unwrap();

        assert_eq!(backend.get(&again.identifier).unwrap().comment, None);
    }

    #[test]
    fn test_conflicting_flags_rejected_remotely() {
        let backend = MemoryBackend::new();
        let mut req = request("P");
        req.or_replace = true;
        req.if_not_exists = true;
        assert!(backend.create(&req).is_err());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_fail_after_skips_calls() {
        let backend = MemoryBackend::new();
        let req = request("P");
        backend.fail_after(1, "throttled");

        backend.create(&req).unwrap();
        let err = backend.show_by_identifier(&req.identifier).unwrap_err();
        assert_eq!(err.to_string(), "show failed: throttled");
        assert!(backend.show_by_identifier(&req.identifier).is_ok());
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        let id = PolicyIdentifier::new("DB", "SCH", "MISSING").unwrap();
        assert!(backend.show_by_identifier(&id).unwrap_err().is_not_found());
        assert!(backend.delete(&id).unwrap_err().is_not_found());
        assert!(
            backend
                .alter(&id, &UpdateRequest::default())
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_describe_requires_capability() {
        let backend = MemoryBackend::new();
        let req = request("P");
        backend.create(&req).unwrap();
        assert!(!backend.supports_detailed_describe());
        assert!(backend.describe(&req.identifier).is_err());

        let detailed = MemoryBackend::with_detailed_describe();
        detailed.create(&req).unwrap();
        assert!(detailed.supports_detailed_describe());
        assert_eq!(detailed.describe(&req.identifier).unwrap(), DetailedSettings::default());
    }

    #[test]
    fn test_fail_next_applies_once() {
        let backend = MemoryBackend::new();
        backend.fail_next("boom");
        let err = backend.create(&request("P")).unwrap_err();
        assert!(err.to_string().contains("boom"));
        backend.create(&request("P")).unwrap();
        assert_eq!(backend.calls().len(), 2);
    }
}
