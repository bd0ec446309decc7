//! REST control-plane backend.
//!
//! Policies are addressed as
//! `{base}/databases/{database}/schemas/{schema}/authentication-policies/{name}`
//! with every path segment percent-encoded:
//!
//! | Verb     | Request                                        |
//! |----------|------------------------------------------------|
//! | create   | `POST …/authentication-policies` (JSON body)   |
//! | show     | `GET …/authentication-policies/{name}`         |
//! | alter    | `PATCH …/authentication-policies/{name}`       |
//! | delete   | `DELETE …/authentication-policies/{name}`      |
//! | describe | `GET …/authentication-policies/{name}/describe`|
//!
//! A 404 is reported as [`Error::NotFound`]; any other non-2xx status becomes
//! [`Error::RemoteOperationFailed`] carrying the server's message.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::identifier::PolicyIdentifier;
use crate::types::{CreateRequest, DetailedSettings, RemotePolicy, UpdateRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP backend.
///
/// # Example
///
/// ```no_run
/// use policykit::backend::http::HttpBackend;
/// use policykit::backend::Backend;
/// use policykit::PolicyIdentifier;
///
/// let backend = HttpBackend::new("https://control.example.com/api/v2");
/// let id = PolicyIdentifier::new("SALES", "PUBLIC", "MFA_POLICY").unwrap();
/// let policy = backend.show_by_identifier(&id).unwrap();
/// println!("{:?}", policy.comment);
/// ```
pub struct HttpBackend {
    agent: ureq::Agent,
    api_base: String,
    token: Option<String>,
    detailed_describe: bool,
}

impl HttpBackend {
    /// Create a backend for the given API base URL.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_timeout(api_base, DEFAULT_TIMEOUT)
    }

    /// Create a backend with a custom global request timeout.
    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: None,
            detailed_describe: false,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Declare that the server implements the describe endpoint.
    pub fn with_detailed_describe(mut self, enabled: bool) -> Self {
        self.detailed_describe = enabled;
        self
    }

    /// Get the current API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn collection_url(&self, database: &str, schema: &str) -> String {
        format!(
            "{}/databases/{}/schemas/{}/authentication-policies",
            self.api_base,
            urlencoding::encode(database),
            urlencoding::encode(schema)
        )
    }

    fn policy_url(&self, id: &PolicyIdentifier) -> String {
        format!(
            "{}/{}",
            self.collection_url(id.database(), id.schema()),
            urlencoding::encode(id.name())
        )
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }
}

#[derive(Serialize)]
struct CreateBody<'a> {
    name: &'a str,
    or_replace: bool,
    if_not_exists: bool,
    #[serde(flatten)]
    settings: &'a DetailedSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a response to an error unless its status is 2xx.
fn check(
    operation: &'static str,
    id: &PolicyIdentifier,
    mut response: Response<Body>,
) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if status == 404 {
        return Err(Error::NotFound {
            identifier: id.qualified_name(),
        });
    }
    if !(200..300).contains(&status) {
        let body = response.body_mut().read_to_string().unwrap_or_default();
        return Err(Error::remote(operation, Some(status), remote_message(&body)));
    }
    Ok(response)
}

/// Extract the server's message from an error body.
fn remote_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) if body.trim().is_empty() => "no message from server".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

impl Backend for HttpBackend {
    fn create(&self, request: &CreateRequest) -> Result<()> {
        let id = &request.identifier;
        let url = self.collection_url(id.database(), id.schema());
        let body = CreateBody {
            name: id.name(),
            or_replace: request.or_replace,
            if_not_exists: request.if_not_exists,
            settings: &request.settings,
            comment: request.comment.as_deref(),
        };

        log::debug!("POST {url}");
        let response = self
            .authorize(self.agent.post(&url))
            .send_json(&body)
            .map_err(|e| Error::transport("create", e))?;
        check("create", id, response)?;
        Ok(())
    }

    fn show_by_identifier(&self, id: &PolicyIdentifier) -> Result<RemotePolicy> {
        let url = self.policy_url(id);

        log::debug!("GET {url}");
        let response = self
            .authorize(self.agent.get(&url))
            .call()
            .map_err(|e| Error::transport("show", e))?;
        let policy = check("show", id, response)?
            .body_mut()
            .read_json::<RemotePolicy>()
            .map_err(|e| Error::transport("show", e))?;
        Ok(policy)
    }

    fn alter(&self, id: &PolicyIdentifier, request: &UpdateRequest) -> Result<()> {
        let url = self.policy_url(id);

        log::debug!("PATCH {url}");
        let response = self
            .authorize(self.agent.patch(&url))
            .send_json(request)
            .map_err(|e| Error::transport("alter", e))?;
        check("alter", id, response)?;
        Ok(())
    }

    fn delete(&self, id: &PolicyIdentifier) -> Result<()> {
        let url = self.policy_url(id);

        log::debug!("DELETE {url}");
        let response = self
            .authorize(self.agent.delete(&url))
            .call()
            .map_err(|e| Error::transport("delete", e))?;
        check("delete", id, response)?;
        Ok(())
    }

    fn supports_detailed_describe(&self) -> bool {
        self.detailed_describe
    }

    fn describe(&self, id: &PolicyIdentifier) -> Result<DetailedSettings> {
        let url = format!("{}/describe", self.policy_url(id));

        log::debug!("GET {url}");
        let response = self
            .authorize(self.agent.get(&url))
            .call()
            .map_err(|e| Error::transport("describe", e))?;
        let settings = check("describe", id, response)?
            .body_mut()
            .read_json::<DetailedSettings>()
            .map_err(|e| Error::transport("describe", e))?;
        Ok(settings)
    }
}
