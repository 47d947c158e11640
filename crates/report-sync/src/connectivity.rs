//! Reachability probe against the backend health endpoint.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use catchlog_core::sync::ConnectivityProbe;

use crate::error::Result;
use crate::http::build_client;

const PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct HttpConnectivityProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpConnectivityProbe {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(PROBE_TIMEOUT_SECS))?,
            url: format!("{}/health", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    /// GET {base}/health. Any answer below 500 means the network path works.
    async fn is_connected(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let reachable = !response.status().is_server_error();
                debug!(
                    "[ReportSync] Connectivity probe: {} -> {}",
                    self.url,
                    response.status()
                );
                reachable
            }
            Err(err) => {
                debug!("[ReportSync] Connectivity probe failed: {}", err);
                false
            }
        }
    }
}
