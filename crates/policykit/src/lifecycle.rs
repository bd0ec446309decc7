//! Lifecycle verbs: create, read, update, delete and import.
//!
//! Each verb works on one [`ResourceData`] slot and runs a short serial chain
//! of remote calls: the verb itself, then a read to resynchronize tracked
//! state from the remote source of truth.
//!
//! Only [`Error::NotFound`] is interpreted here:
//! - on read it means the policy was dropped out-of-band, so the slot is cleared
//! - on delete it means there is nothing left to do
//! - after create, update or import it is an error

use crate::backend::Backend;
use crate::diff::{Field, FieldValue};
use crate::error::{Error, Result};
use crate::identifier::{self, PolicyIdentifier};
use crate::reconciler::{self, Fetched};
use crate::translator;
use crate::types::{PolicyConfig, TrackedState, UpdatePlan};

/// Per-instance slot handed to every lifecycle verb.
///
/// Holds the declared configuration (if any), the tracked key and the
/// tracked attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceData {
    config: Option<PolicyConfig>,
    id: Option<String>,
    state: Option<TrackedState>,
}

impl ResourceData {
    /// An empty slot with nothing declared or tracked.
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot declaring `config` with nothing tracked yet.
    pub fn with_config(config: PolicyConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// A slot restored from persisted tracked state.
    pub fn from_tracked(id: String, state: Option<TrackedState>) -> Self {
        Self {
            config: None,
            id: Some(id),
            state,
        }
    }

    /// Replace the declared configuration.
    pub fn set_config(&mut self, config: Option<PolicyConfig>) {
        self.config = config;
    }

    /// Declared configuration.
    pub fn config(&self) -> Option<&PolicyConfig> {
        self.config.as_ref()
    }

    /// Tracked key (identifier token).
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set the tracked key.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Drop the tracked key together with every tracked attribute.
    pub fn clear_id(&mut self) {
        self.id = None;
        self.state = None;
    }

    /// Tracked attributes.
    pub fn state(&self) -> Option<&TrackedState> {
        self.state.as_ref()
    }

    /// Whether anything is tracked.
    pub fn is_tracked(&self) -> bool {
        self.id.is_some()
    }

    /// Declared value of one attribute.
    pub fn desired_value(&self, field: Field) -> Option<FieldValue> {
        self.config.as_ref().and_then(|c| field.desired_value(c))
    }

    /// Tracked value of one attribute.
    pub fn tracked_value(&self, field: Field) -> Option<FieldValue> {
        self.state.as_ref().map(|s| field.tracked_value(s))
    }

    /// Split into tracked key and attributes for persistence.
    pub fn into_tracked(self) -> (Option<String>, Option<TrackedState>) {
        (self.id, self.state)
    }

    fn require_config(&self) -> Result<&PolicyConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no desired configuration".to_string()))
    }

    fn require_identifier(&self) -> Result<PolicyIdentifier> {
        let token = self
            .id
            .as_deref()
            .ok_or_else(|| Error::InvalidState("policy is not tracked".to_string()))?;
        identifier::decode(token)
    }
}

/// Create the declared policy, then read it back.
///
/// Once the remote create has succeeded the slot keeps its key even if the
/// trailing read fails, since the policy exists remotely; a later read
/// resynchronizes the seeded attributes.
pub fn create(backend: &dyn Backend, data: &mut ResourceData) -> Result<()> {
    if let Some(id) = data.id() {
        return Err(Error::InvalidState(format!("policy is already tracked as {id:?}")));
    }
    let config = data.require_config()?;
    let request = translator::build_create_request(config)?;
    let seeded = TrackedState::seeded_from(config);

    log::info!("Creating authentication policy {}", request.identifier);
    backend.create(&request)?;

    data.id = Some(request.identifier.encode()?);
    data.state = Some(seeded);
    resync(backend, data, &request.identifier)
}

/// Refresh tracked state from the remote system.
///
/// A policy that no longer exists is dropped from tracked state without error.
pub fn read(backend: &dyn Backend, data: &mut ResourceData) -> Result<()> {
    let id = data.require_identifier()?;
    if !refresh(backend, data, &id)? {
        log::warn!("Authentication policy {id} no longer exists; removing it from tracked state");
    }
    Ok(())
}

/// Alter the tracked policy towards its declared configuration, then read it back.
pub fn update(backend: &dyn Backend, data: &mut ResourceData) -> Result<()> {
    let id = data.require_identifier()?;
    let config = data.require_config()?;
    let previous = data
        .state
        .as_ref()
        .ok_or_else(|| Error::InvalidState(format!("no tracked attributes for {id}")))?;

    match translator::build_update_request(config, previous)? {
        UpdatePlan::NoOp => log::debug!("Nothing to alter on {id}"),
        UpdatePlan::Alter(request) => {
            log::info!("Altering authentication policy {id}");
            backend.alter(&id, &request)?;
        }
    }
    resync(backend, data, &id)
}

/// Drop the tracked policy. A policy that is already gone counts as deleted.
pub fn delete(backend: &dyn Backend, data: &mut ResourceData) -> Result<()> {
    let id = data.require_identifier()?;

    log::info!("Dropping authentication policy {id}");
    match backend.delete(&id) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => log::debug!("{id} was already absent"),
        Err(e) => return Err(e),
    }
    data.clear_id();
    Ok(())
}

/// Start tracking an existing policy identified by `raw`.
///
/// Fails if `raw` is not a valid token or the policy does not exist.
pub fn import(backend: &dyn Backend, data: &mut ResourceData, raw: &str) -> Result<()> {
    if let Some(existing) = data.id() {
        return Err(Error::InvalidState(format!(
            "slot already tracks {existing:?}"
        )));
    }
    let id = identifier::decode(raw)?;

    let seeded = match data.config() {
        Some(config) if config.identifier().ok().as_ref() == Some(&id) => {
            TrackedState::seeded_from(config)
        }
        _ => TrackedState::seeded_for(&id),
    };

    log::info!("Importing authentication policy {id}");
    data.id = Some(id.encode()?);
    data.state = Some(seeded);
    resync(backend, data, &id)
}

/// Read after a write; the policy must exist.
fn resync(backend: &dyn Backend, data: &mut ResourceData, id: &PolicyIdentifier) -> Result<()> {
    if refresh(backend, data, id)? {
        Ok(())
    } else {
        Err(Error::NotFound {
            identifier: id.qualified_name(),
        })
    }
}

/// Fetch and project; returns `false` (with the slot cleared) if the policy is gone.
fn refresh(backend: &dyn Backend, data: &mut ResourceData, id: &PolicyIdentifier) -> Result<bool> {
    let remote = match reconciler::fetch_by_identifier(backend, id)? {
        Fetched::Found(remote) => remote,
        Fetched::NotFound => {
            data.clear_id();
            return Ok(false);
        }
    };
    let detailed = reconciler::fetch_detailed(backend, id)?;
    data.state = Some(reconciler::project(remote, id, data.state.as_ref(), detailed));
    Ok(true)
}
