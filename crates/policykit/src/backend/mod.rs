//! Backend abstraction for the remote control plane.
//!
//! The [`Backend`] trait is the only way this crate reaches the remote system,
//! allowing for different implementations:
//! - [`http::HttpBackend`] for a REST control plane
//! - [`memory::MemoryBackend`] as an in-process control plane for tests
//!
//! Transport concerns (authentication, timeouts, retries) belong to the
//! implementation, never to the lifecycle code calling it.

pub mod http;
pub mod memory;

use crate::error::{Error, Result};
use crate::identifier::PolicyIdentifier;
use crate::types::{CreateRequest, DetailedSettings, RemotePolicy, UpdateRequest};

/// Remote API client for authentication policies.
///
/// Lookups and deletes must report a missing object as [`Error::NotFound`],
/// distinct from every other failure.
pub trait Backend: Send + Sync {
    /// Create a policy.
    fn create(&self, request: &CreateRequest) -> Result<()>;

    /// Show the policy at `id`.
    fn show_by_identifier(&self, id: &PolicyIdentifier) -> Result<RemotePolicy>;

    /// Alter a policy in place.
    fn alter(&self, id: &PolicyIdentifier, request: &UpdateRequest) -> Result<()>;

    /// Drop a policy.
    fn delete(&self, id: &PolicyIdentifier) -> Result<()>;

    /// Whether [`Backend::describe`] returns the detailed settings.
    fn supports_detailed_describe(&self) -> bool {
        false
    }

    /// Describe the fine-grained settings of a policy.
    fn describe(&self, id: &PolicyIdentifier) -> Result<DetailedSettings> {
        Err(Error::remote(
            "describe",
            None,
            format!("describe is not available for {id}"),
        ))
    }
}
