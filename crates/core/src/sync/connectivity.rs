use async_trait::async_trait;
use log::debug;

use crate::config::EngineConfig;

/// Reports whether the backend is reachable right now.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Probe up to `connectivity_probe_attempts` times, sleeping with doubling
/// backoff between failures. Tolerates a network stack that is still coming
/// up on cold start.
pub async fn probe_with_backoff(probe: &dyn ConnectivityProbe, config: &EngineConfig) -> bool {
    let attempts = config.connectivity_probe_attempts.max(1);
    for attempt in 1..=attempts {
        if probe.is_connected().await {
            return true;
        }
        if attempt < attempts {
            let delay = config.connectivity_backoff(attempt);
            debug!(
                "[ReportSync] Connectivity probe {}/{} failed, retrying in {:?}",
                attempt, attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
    false
}
