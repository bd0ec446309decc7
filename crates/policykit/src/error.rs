//! Error types for policy lifecycle operations.
//!
//! Errors are categorized so the orchestrating framework can decide how to
//! report them. Only [`Error::NotFound`] is ever handled inside this crate;
//! every other variant propagates to the caller unchanged.

use std::fmt;
use thiserror::Error;

/// Categories of policy errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Identifier could not be built or parsed
    Identifier,
    /// Object is absent on the remote side
    NotFound,
    /// The remote system rejected or failed the operation
    Remote,
    /// The requested change cannot be translated yet
    Unsupported,
    /// A local precondition did not hold
    Precondition,
}

impl ErrorCategory {
    /// Whether this error can be absorbed locally (the object is already gone).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identifier => "Invalid policy identifier",
            Self::NotFound => "Policy not found",
            Self::Remote => "Remote operation failed",
            Self::Unsupported => "Change not supported",
            Self::Precondition => "Precondition failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Identifier => "Use the form database|schema|name and escape '|' and '\\' with '\\'",
            Self::NotFound => "Verify the policy exists, or remove it from tracked state",
            Self::Remote => "Check the remote system's message for details",
            Self::Unsupported => "Destroy and re-apply the policy to change this attribute",
            Self::Precondition => "Check the declared configuration and tracked state",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while managing a policy.
#[derive(Debug, Error)]
pub enum Error {
    /// One of the identifier parts was empty at encode time
    #[error("malformed identifier: {part} must not be empty")]
    MalformedIdentifierInput {
        /// Which part was empty ("database", "schema" or "name")
        part: &'static str,
    },

    /// A stored or supplied token does not match the identifier grammar
    #[error("undecodable identifier {token:?}: {reason}")]
    UndecodableIdentifier {
        /// The offending token
        token: String,
        /// What was wrong with it
        reason: String,
    },

    /// The object does not exist on the remote side
    #[error("authentication policy not found: {identifier}")]
    NotFound {
        /// Qualified name of the missing object
        identifier: String,
    },

    /// Any other failure reported by the remote system
    #[error("{operation} failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    RemoteOperationFailed {
        /// Remote verb that failed
        operation: &'static str,
        /// Transport status code, when there is one
        status: Option<u16>,
        /// Message from the remote system, verbatim
        message: String,
    },

    /// An update touches a field that cannot be altered in place yet
    #[error("update not yet supported for field {field}")]
    UnsupportedUpdate {
        /// Attribute name
        field: &'static str,
    },

    /// An identity field changed; the policy must be replaced instead
    #[error("{field} cannot change from {from:?} to {to:?} without replacing the policy")]
    ImmutableField {
        /// Attribute name
        field: &'static str,
        /// Tracked value
        from: String,
        /// Declared value
        to: String,
    },

    /// Both `or_replace` and `if_not_exists` were requested
    #[error("or_replace and if_not_exists are mutually exclusive")]
    ConflictingCreateFlags,

    /// The tracked slot is not in the state a verb requires
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A value outside an enumerated vocabulary
    #[error("invalid value {value:?} for {field}")]
    InvalidValue {
        /// Attribute name
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// The remote system answered with something unparseable
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Create a remote failure for the given operation.
    pub fn remote(operation: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteOperationFailed {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Map a transport failure of `operation`.
    pub fn transport(operation: &'static str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::remote(operation, Some(code), format!("HTTP {code}")),
            ureq::Error::Json(e) => Self::InvalidResponse(format!("{operation}: {e}")),
            other => Self::remote(operation, None, other.to_string()),
        }
    }

    /// Create an undecodable-identifier error.
    pub fn undecodable(token: &str, reason: impl Into<String>) -> Self {
        Self::UndecodableIdentifier {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedIdentifierInput { .. } | Error::UndecodableIdentifier { .. } => {
                ErrorCategory::Identifier
            }
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::RemoteOperationFailed { .. } | Error::InvalidResponse(_) => {
                ErrorCategory::Remote
            }
            Error::UnsupportedUpdate { .. } | Error::ImmutableField { .. } => {
                ErrorCategory::Unsupported
            }
            Error::ConflictingCreateFlags | Error::InvalidState(_) | Error::InvalidValue { .. } => {
                ErrorCategory::Precondition
            }
        }
    }

    /// Whether the remote system reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, Error>;
