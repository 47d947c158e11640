//! Endpoint configuration for the HTTP clients.

use crate::error::{ReportSyncError, Result};

pub const BACKEND_URL_ENV: &str = "CATCHLOG_BACKEND_URL";
pub const BACKEND_API_KEY_ENV: &str = "CATCHLOG_BACKEND_API_KEY";
pub const GOVERNMENT_URL_ENV: &str = "CATCHLOG_GOVERNMENT_URL";
pub const DELIVERY_URL_ENV: &str = "CATCHLOG_DELIVERY_URL";
pub const CONNECTIVITY_URL_ENV: &str = "CATCHLOG_CONNECTIVITY_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSyncConfig {
    /// Base URL of the application backend (REST + auth).
    pub backend_url: String,
    /// Public (anon) API key sent on every backend request.
    pub api_key: String,
    pub government_url: String,
    /// Full URL of the delivery-confirmation webhook.
    pub delivery_url: String,
    /// Base URL probed for connectivity. Defaults to the backend.
    pub connectivity_url: Option<String>,
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ReportSyncError::config(format!(
            "{} is not set; report sync needs it to reach its endpoints",
            name
        ))),
    }
}

impl ReportSyncConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            backend_url: required(BACKEND_URL_ENV)?,
            api_key: required(BACKEND_API_KEY_ENV)?,
            government_url: required(GOVERNMENT_URL_ENV)?,
            delivery_url: required(DELIVERY_URL_ENV)?,
            connectivity_url: std::env::var(CONNECTIVITY_URL_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty()),
        })
    }

    pub fn connectivity_base_url(&self) -> &str {
        self.connectivity_url.as_deref().unwrap_or(&self.backend_url)
    }
}
