//! Error types for the report engine.

use thiserror::Error;

use crate::reports::ReportStatus;
use crate::sync::SyncRetryClass;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for calls that leave the device.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Errors surfaced by the engine services and the local repository.
#[derive(Debug, Error)]
pub enum Error {
    /// The storage backend failed to read or write a key.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A remote call failed; the tag says whether it is worth retrying.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Input rejected before it reached any remote system.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid report status transition: {from} -> {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },

    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Tagged outcome of a failed remote call.
///
/// Every client maps its transport failures into one of these three cases so
/// callers can decide between retrying, falling back, or surfacing the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No network, timeout, or a server-side transient failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Missing, stale or rejected session.
    #[error("Authorization error: {0}")]
    Auth(String),

    /// The remote system understood the request and refused it.
    #[error("Remote rejected request: {0}")]
    Logical(String),
}

impl RemoteError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn logical(message: impl Into<String>) -> Self {
        Self::Logical(message.into())
    }

    /// Build from an HTTP status using the shared retry classification.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match crate::sync::classify_http_status(status) {
            SyncRetryClass::Retryable => Self::Network(format!("HTTP {}: {}", status, message)),
            SyncRetryClass::ReauthRequired => Self::Auth(format!("HTTP {}: {}", status, message)),
            SyncRetryClass::Permanent => Self::Logical(format!("HTTP {}: {}", status, message)),
        }
    }

    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Network(_) => SyncRetryClass::Retryable,
            Self::Auth(_) => SyncRetryClass::ReauthRequired,
            Self::Logical(_) => SyncRetryClass::Permanent,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_maps_to_tagged_outcomes() {
        assert!(RemoteError::from_status(503, "down").is_network());
        assert!(RemoteError::from_status(429, "slow down").is_network());
        assert!(RemoteError::from_status(401, "expired").is_auth());
        assert_eq!(
            RemoteError::from_status(400, "bad area code"),
            RemoteError::Logical("HTTP 400: bad area code".to_string())
        );
    }

    #[test]
    fn logical_errors_are_permanent() {
        let err = RemoteError::logical("constraint violation");
        assert_eq!(err.retry_class(), SyncRetryClass::Permanent);
    }
}
