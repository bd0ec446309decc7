//! Read path: fetch remote state and project it onto tracked state.

use crate::backend::Backend;
use crate::error::Result;
use crate::identifier::PolicyIdentifier;
use crate::types::{DetailedSettings, RemotePolicy, TrackedState};

/// Outcome of a lookup by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// The policy exists
    Found(RemotePolicy),
    /// The remote system has no such policy
    NotFound,
}

/// Look up a policy, separating "absent" from every other failure.
pub fn fetch_by_identifier(backend: &dyn Backend, id: &PolicyIdentifier) -> Result<Fetched> {
    match backend.show_by_identifier(id) {
        Ok(policy) => Ok(Fetched::Found(policy)),
        Err(e) if e.is_not_found() => Ok(Fetched::NotFound),
        Err(e) => Err(e),
    }
}

/// Fetch the detailed settings when the backend can describe them.
pub fn fetch_detailed(backend: &dyn Backend, id: &PolicyIdentifier) -> Result<Option<DetailedSettings>> {
    if !backend.supports_detailed_describe() {
        return Ok(None);
    }
    backend.describe(id).map(Some)
}

/// Project remote state onto tracked state.
///
/// Identity and comment come from `remote`; the qualified name is recomputed
/// from `id`. Detailed settings are taken from `detailed` when present and
/// otherwise left exactly as previously tracked, unknown included.
/// Idempotency flags are never reported by the remote system and are carried
/// over unchanged.
pub fn project(
    remote: RemotePolicy,
    id: &PolicyIdentifier,
    previous: Option<&TrackedState>,
    detailed: Option<DetailedSettings>,
) -> TrackedState {
    let mut tracked = previous
        .cloned()
        .unwrap_or_else(|| TrackedState::seeded_for(id));

    tracked.database = remote.database_name;
    tracked.schema = remote.schema_name;
    tracked.name = remote.name;
    tracked.comment = remote.comment;
    if let Some(settings) = detailed {
        tracked.settings = Some(settings);
    }
    tracked.set_qualified_name(id);
    tracked
}
