//! Error types for the report sync crate.

use catchlog_core::sync::{classify_http_status, SyncRetryClass};
use catchlog_core::RemoteError;
use thiserror::Error;

/// Result type alias for report sync HTTP operations.
pub type Result<T> = std::result::Result<T, ReportSyncError>;

/// Errors that can occur while talking to the backend, the government
/// endpoint or the delivery webhook.
#[derive(Debug, Error)]
pub enum ReportSyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from a remote service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Missing or malformed client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReportSyncError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(err) if err.is_decode() => SyncRetryClass::Permanent,
            Self::Http(_) => SyncRetryClass::Retryable,
            Self::Json(_) => SyncRetryClass::Permanent,
            Self::InvalidRequest(_) => SyncRetryClass::Permanent,
            Self::Auth(_) => SyncRetryClass::ReauthRequired,
            Self::Config(_) => SyncRetryClass::Permanent,
        }
    }
}

impl From<ReportSyncError> for RemoteError {
    fn from(err: ReportSyncError) -> Self {
        let message = err.to_string();
        match err.retry_class() {
            SyncRetryClass::Retryable => RemoteError::Network(message),
            SyncRetryClass::ReauthRequired => RemoteError::Auth(message),
            SyncRetryClass::Permanent => RemoteError::Logical(message),
        }
    }
}
