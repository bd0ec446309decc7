//! # policykit
//!
//! Reconciliation engine for authentication policies stored in a remote
//! control plane.
//!
//! This crate provides functionality for:
//! - Encoding and decoding the `database|schema|name` identifier token
//! - Translating a declared policy into create and alter requests
//! - Projecting remote state onto tracked state and detecting drift
//! - Running the create/read/update/delete/import lifecycle against a [`Backend`]
//!
//! ## Example
//!
//! ```no_run
//! use policykit::backend::http::HttpBackend;
//! use policykit::{Client, PolicyConfig, ResourceData};
//!
//! let client = Client::new(HttpBackend::new("https://control.example.com/api/v2"));
//!
//! let config = PolicyConfig::new("ANALYTICS", "PUBLIC", "POLICY1").with_comment("test");
//! let mut data = ResourceData::with_config(config);
//! client.create(&mut data).expect("create failed");
//!
//! assert_eq!(data.id(), Some("ANALYTICS|PUBLIC|POLICY1"));
//! ```
//!
//! ## Drift suppression
//!
//! `or_replace` and `if_not_exists` only shape the create request. Changing
//! either on an existing policy never produces a diff:
//!
//! ```
//! use policykit::{PolicyConfig, TrackedState, compute_drift};
//!
//! let tracked = TrackedState::seeded_from(&PolicyConfig::new("DB", "SCH", "P"));
//! let mut desired = PolicyConfig::new("DB", "SCH", "P");
//! desired.or_replace = true;
//!
//! assert!(compute_drift(&tracked, &desired).is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod diff;
pub mod error;
pub mod identifier;
pub mod lifecycle;
pub mod reconciler;
pub mod translator;
pub mod types;

pub use diff::{AttributeDiff, Field, FieldValue, compute_drift, requires_replacement};
pub use error::{Error, ErrorCategory, Result};
pub use identifier::{PolicyIdentifier, decode, encode};
pub use lifecycle::ResourceData;
pub use types::{
    CreateRequest, DetailedSettings, MfaEnrollment, PolicyConfig, RemotePolicy, TrackedState,
    UpdatePlan, UpdateRequest,
};

use backend::Backend;

/// High-level client for policy lifecycle operations.
///
/// The client wraps a backend and runs each lifecycle verb against it.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client over the given backend.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Create a client with an already boxed backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create the declared policy and read it back.
    pub fn create(&self, data: &mut ResourceData) -> Result<()> {
        lifecycle::create(self.backend(), data)
    }

    /// Refresh tracked state; a vanished policy is dropped from tracking.
    pub fn read(&self, data: &mut ResourceData) -> Result<()> {
        lifecycle::read(self.backend(), data)
    }

    /// Alter the tracked policy towards its declared configuration.
    pub fn update(&self, data: &mut ResourceData) -> Result<()> {
        lifecycle::update(self.backend(), data)
    }

    /// Drop the tracked policy.
    pub fn delete(&self, data: &mut ResourceData) -> Result<()> {
        lifecycle::delete(self.backend(), data)
    }

    /// Start tracking the existing policy named by `token`.
    pub fn import(&self, data: &mut ResourceData, token: &str) -> Result<()> {
        lifecycle::import(self.backend(), data, token)
    }

    // =========================================================================
    // Planning
    // =========================================================================

    /// Compare tracked state against the declared configuration.
    pub fn drift(&self, data: &ResourceData) -> Vec<AttributeDiff> {
        match (data.state(), data.config()) {
            (Some(state), Some(config)) => compute_drift(state, config),
            _ => Vec::new(),
        }
    }
}
