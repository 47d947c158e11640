use std::sync::Arc;

use log::{debug, info, warn};

use crate::errors::Result;
use crate::remote::ReportBackend;
use crate::reports::{LocalReportRepository, Report, ReportUpdate, WebhookStatus, WebhookUpdate};

use super::{DeliveryPayload, DeliveryResult, DeliveryRetrySummary, DeliveryService};

/// Sends delivery confirmations and retries the ones that failed.
///
/// Attempts only ever grow: every try is recorded, successful or not, so a
/// report stops being retried after `max_attempts` tries.
pub struct DeliveryRetryManager {
    backend: Arc<dyn ReportBackend>,
    repository: Arc<LocalReportRepository>,
    delivery: Arc<dyn DeliveryService>,
    max_attempts: u32,
}

impl DeliveryRetryManager {
    pub fn new(
        backend: Arc<dyn ReportBackend>,
        repository: Arc<LocalReportRepository>,
        delivery: Arc<dyn DeliveryService>,
        max_attempts: u32,
    ) -> Self {
        Self {
            backend,
            repository,
            delivery,
            max_attempts,
        }
    }

    /// First delivery for a report the backend already holds. Returns `None`
    /// when the angler asked for no confirmation.
    pub async fn deliver_for_report(&self, report: &Report) -> Option<WebhookUpdate> {
        let payload = DeliveryPayload::from_report(report);
        if !payload.wants_confirmation() {
            return None;
        }
        let result = self.delivery.deliver(&payload).await;
        let update = webhook_update(&result, report.webhook_attempts);
        if !result.success {
            warn!(
                "[Delivery] Delivery for report {} failed: {}",
                report.id,
                update.webhook_error.as_deref().unwrap_or("unknown error")
            );
        }
        self.record(&report.id, &update).await;
        Some(update)
    }

    /// Retry every failed delivery that still has attempts left and a known
    /// government object id.
    pub async fn retry_failed_deliveries(&self) -> Result<DeliveryRetrySummary> {
        let candidates = self.backend.list_failed_deliveries(self.max_attempts).await?;
        let mut summary = DeliveryRetrySummary::default();

        for remote in candidates {
            if remote.webhook_status != Some(WebhookStatus::Failed)
                || remote.webhook_attempts >= self.max_attempts
            {
                continue;
            }
            if remote.dmf_object_id.is_none() {
                debug!(
                    "[Delivery] Skipping report {}: government object id unknown",
                    remote.id
                );
                summary.skipped += 1;
                continue;
            }

            let payload = DeliveryPayload::from_remote(&remote);
            let result = self.delivery.deliver(&payload).await;
            let update = webhook_update(&result, remote.webhook_attempts);
            summary.retried += 1;
            if result.success {
                summary.succeeded += 1;
            } else {
                warn!(
                    "[Delivery] Retry {} for report {} (confirmation {}) failed: {}",
                    update.webhook_attempts,
                    remote.id,
                    remote.dmf_confirmation_number.as_deref().unwrap_or("-"),
                    update.webhook_error.as_deref().unwrap_or("unknown error")
                );
            }
            self.record(&remote.id, &update).await;
        }

        if summary.retried > 0 {
            info!(
                "[Delivery] Retried {} deliveries, {} succeeded",
                summary.retried, summary.succeeded
            );
        }
        Ok(summary)
    }

    /// Write the attempt remotely and to the local copy when there is one.
    /// Bookkeeping failures are logged; the next retry pass will see the
    /// stale state and try again.
    async fn record(&self, report_id: &str, update: &WebhookUpdate) {
        if let Err(err) = self.backend.update_delivery_status(report_id, update).await {
            warn!(
                "[Delivery] Failed to record delivery status for report {}: {}",
                report_id, err
            );
        }
        if self.repository.get(report_id).is_some() {
            if let Err(err) = self
                .repository
                .update(report_id, ReportUpdate::webhook(update.clone()))
            {
                warn!(
                    "[Delivery] Failed to update local delivery status for report {}: {}",
                    report_id, err
                );
            }
        }
    }
}

fn webhook_update(result: &DeliveryResult, previous_attempts: u32) -> WebhookUpdate {
    WebhookUpdate {
        webhook_status: if result.success {
            WebhookStatus::Sent
        } else {
            WebhookStatus::Failed
        },
        webhook_error: if result.success {
            None
        } else {
            result
                .error_summary()
                .or_else(|| Some("Delivery failed".to_string()))
        },
        webhook_attempts: previous_attempts.saturating_add(1),
    }
}
