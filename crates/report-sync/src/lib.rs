//! HTTP implementations of the catchlog engine ports: application backend,
//! government reporting endpoint, delivery-confirmation webhook and
//! connectivity probe.

mod backend_client;
mod config;
mod connectivity;
mod delivery_client;
mod error;
mod government_client;
mod http;
mod types;

#[cfg(test)]
mod test_server;

pub use backend_client::BackendClient;
pub use config::ReportSyncConfig;
pub use connectivity::HttpConnectivityProbe;
pub use delivery_client::DeliveryClient;
pub use error::{ReportSyncError, Result};
pub use government_client::GovernmentClient;
pub use types::*;

/// All clients built from one configuration.
pub struct ReportSyncClients {
    pub backend: BackendClient,
    pub government: GovernmentClient,
    pub delivery: DeliveryClient,
    pub connectivity: HttpConnectivityProbe,
}

impl ReportSyncClients {
    pub fn from_config(
        config: &ReportSyncConfig,
        secrets: std::sync::Arc<dyn catchlog_core::secrets::SecretStore>,
    ) -> Result<Self> {
        Ok(Self {
            backend: BackendClient::new(&config.backend_url, &config.api_key, secrets)?,
            government: GovernmentClient::new(&config.government_url)?,
            delivery: DeliveryClient::new(&config.delivery_url)?,
            connectivity: HttpConnectivityProbe::new(config.connectivity_base_url())?,
        })
    }
}
