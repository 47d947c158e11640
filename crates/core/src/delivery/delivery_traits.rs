use async_trait::async_trait;

use super::{DeliveryPayload, DeliveryResult};

/// Sends the angler's SMS / email confirmation.
///
/// Transport failures are folded into an unsuccessful [`DeliveryResult`];
/// callers only ever record the outcome.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    async fn deliver(&self, payload: &DeliveryPayload) -> DeliveryResult;
}
