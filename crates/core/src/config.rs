//! Tunables for the sync engine.

use std::str::FromStr;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::reports::DEFAULT_PENDING_SOFT_CAP;

/// Engine limits. Defaults match the production app; hosts may override them
/// from the environment with [`EngineConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Attempts before a government-direct submission expires.
    pub submission_max_retries: u32,
    /// Entries kept in the local submission history.
    pub submission_history_cap: usize,
    /// Connectivity probes per sync cycle.
    pub connectivity_probe_attempts: u32,
    /// Delay after the first failed probe; doubles after each further failure.
    pub connectivity_backoff_base_ms: u64,
    /// Delivery-confirmation attempts per report.
    pub webhook_max_attempts: u32,
    /// Pending-sync index size above which a warning is logged.
    pub pending_soft_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            submission_max_retries: 3,
            submission_history_cap: 50,
            connectivity_probe_attempts: 3,
            connectivity_backoff_base_ms: 2_000,
            webhook_max_attempts: 3,
            pending_soft_cap: DEFAULT_PENDING_SOFT_CAP,
        }
    }
}

fn env_override<T: FromStr>(name: &str, current: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("[Config] Ignoring invalid value for {}: {:?}", name, raw);
                current
            }
        },
        Err(_) => current,
    }
}

impl EngineConfig {
    /// Defaults overridden by `CATCHLOG_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            submission_max_retries: env_override(
                "CATCHLOG_SUBMISSION_MAX_RETRIES",
                defaults.submission_max_retries,
            ),
            submission_history_cap: env_override(
                "CATCHLOG_SUBMISSION_HISTORY_CAP",
                defaults.submission_history_cap,
            ),
            connectivity_probe_attempts: env_override(
                "CATCHLOG_CONNECTIVITY_PROBE_ATTEMPTS",
                defaults.connectivity_probe_attempts,
            ),
            connectivity_backoff_base_ms: env_override(
                "CATCHLOG_CONNECTIVITY_BACKOFF_MS",
                defaults.connectivity_backoff_base_ms,
            ),
            webhook_max_attempts: env_override(
                "CATCHLOG_WEBHOOK_MAX_ATTEMPTS",
                defaults.webhook_max_attempts,
            ),
            pending_soft_cap: env_override("CATCHLOG_PENDING_SOFT_CAP", defaults.pending_soft_cap),
        }
    }

    /// Delay before probe number `attempt + 1` (1-based `attempt`).
    pub fn connectivity_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(8);
        Duration::from_millis(
            self.connectivity_backoff_base_ms
                .saturating_mul(1_u64 << exponent),
        )
    }
}
