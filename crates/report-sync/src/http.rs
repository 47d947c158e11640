//! Request plumbing shared by the clients.

use std::time::Duration;

use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{ReportSyncError, Result};
use crate::types::{ApiErrorResponse, AuthErrorResponse};

/// Default timeout for API requests.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

pub(crate) fn json_headers(bearer: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = bearer {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ReportSyncError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
    }
    Ok(headers)
}

fn log_response(status: reqwest::StatusCode, body: &str) {
    if status.is_success() {
        debug!("[ReportSync] API response status: {}", status);
        return;
    }

    let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        preview.push_str("...");
    }
    debug!("[ReportSync] API response error ({}): {}", status, preview);
}

fn error_for_status(status: reqwest::StatusCode, body: &str) -> ReportSyncError {
    if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
        return ReportSyncError::api(status.as_u16(), error.summary());
    }
    if let Ok(error) = serde_json::from_str::<AuthErrorResponse>(body) {
        let message = match error.error_description {
            Some(description) => format!("{}: {}", error.error, description),
            None => error.error,
        };
        return ReportSyncError::api(status.as_u16(), message);
    }
    ReportSyncError::api(status.as_u16(), format!("Request failed: {}", body))
}

/// Parse a JSON response body.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    log_response(status, &body);

    if !status.is_success() {
        return Err(error_for_status(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        error!(
            "[ReportSync] Failed to deserialize response. Body: {}, Error: {}",
            body, e
        );
        ReportSyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
    })
}

/// Check the status of a response whose body is not needed.
pub(crate) async fn parse_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        debug!("[ReportSync] API response status: {}", status);
        return Ok(());
    }
    let body = response.text().await?;
    log_response(status, &body);
    Err(error_for_status(status, &body))
}
