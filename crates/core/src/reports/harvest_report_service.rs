use std::collections::HashSet;
use std::sync::Arc;

use log::{error, info, warn};
use uuid::Uuid;

use crate::delivery::{DeliveryRetryManager, DeliveryRetrySummary};
use crate::errors::{Error, Result};
use crate::identity::IdentityResolver;
use crate::submissions::{
    DrainSummary, GovernmentSubmissionClient, OfflineSubmissionQueue, SubmissionOutcome,
};
use crate::sync::{ConnectivityProbe, SyncCycleResult, SyncCycleTrigger, SyncOrchestrator};

use super::{HarvestInput, LocalReportRepository, Report, ReportStatus, ReportUpdate, StatusUpdate};

/// What happened to a freshly submitted harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestSubmissionResult {
    /// The report as stored locally after the pipeline ran.
    pub report: Report,
    pub outcome: SubmissionOutcome,
    /// Set when the government submission was queued for later.
    pub local_confirmation_number: Option<String>,
    /// Whether the application backend already holds the report.
    pub synced: bool,
}

/// Results of one host-triggered maintenance pass. A component that errored
/// is `None`; the error has been logged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceSummary {
    pub sync: Option<SyncCycleResult>,
    pub drain: Option<DrainSummary>,
    pub deliveries: Option<DeliveryRetrySummary>,
}

/// Entry point used by the host app when an angler finishes a report.
pub struct HarvestReportService {
    repository: Arc<LocalReportRepository>,
    identity: Arc<IdentityResolver>,
    government: Arc<dyn GovernmentSubmissionClient>,
    queue: Arc<OfflineSubmissionQueue>,
    orchestrator: Arc<SyncOrchestrator>,
    delivery: Arc<DeliveryRetryManager>,
    connectivity: Arc<dyn ConnectivityProbe>,
}

impl HarvestReportService {
    pub fn new(
        repository: Arc<LocalReportRepository>,
        identity: Arc<IdentityResolver>,
        government: Arc<dyn GovernmentSubmissionClient>,
        queue: Arc<OfflineSubmissionQueue>,
        orchestrator: Arc<SyncOrchestrator>,
        delivery: Arc<DeliveryRetryManager>,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            repository,
            identity,
            government,
            queue,
            orchestrator,
            delivery,
            connectivity,
        }
    }

    /// Save a harvest locally, report it to the government endpoint and
    /// persist it to the backend when online.
    ///
    /// The report is stored and indexed for sync before any network call, so
    /// nothing the angler entered is lost if the app dies mid-pipeline.
    pub async fn submit_harvest(&self, input: HarvestInput) -> Result<HarvestSubmissionResult> {
        input.validate()?;
        let identity = self.identity.resolve_identity().await?;
        let report = Report::new_pending(
            Uuid::new_v4().to_string(),
            identity.member_identity_id,
            Some(identity.device_identity_id),
            input,
        );
        let report = self.repository.add(report)?;
        self.repository.mark_pending(&report.id)?;
        info!(
            "[HarvestReport] Saved report {} for area {}",
            report.id, report.harvest.area_code
        );

        let outcome = self.government.submit(&report.harvest).await;
        let mut local_confirmation_number = None;
        match &outcome {
            SubmissionOutcome::Accepted {
                confirmation_number,
                object_id,
            } => {
                info!(
                    "[HarvestReport] Report {} accepted as {}",
                    report.id, confirmation_number
                );
                self.repository.update(
                    &report.id,
                    ReportUpdate::status(StatusUpdate::submitted(
                        confirmation_number.clone(),
                        *object_id,
                    )),
                )?;
            }
            SubmissionOutcome::Queued { error } => {
                warn!(
                    "[HarvestReport] Government endpoint unreachable for report {}: {}",
                    report.id, error
                );
                local_confirmation_number = Some(self.queue.enqueue_for_report(
                    report.harvest.clone(),
                    &report.id,
                    Some(error.clone()),
                )?);
            }
            SubmissionOutcome::Rejected { error } => {
                error!(
                    "[HarvestReport] Government endpoint rejected report {}: {}",
                    report.id, error
                );
                self.repository
                    .update(&report.id, ReportUpdate::status(StatusUpdate::failed(error)))?;
            }
        }

        let synced = self.persist_now(&report.id).await;
        let report = self
            .repository
            .find(&report.id)
            .ok_or_else(|| Error::NotFound(report.id.clone()))?;

        if synced && outcome.is_accepted() {
            self.delivery.deliver_for_report(&report).await;
        }
        let report = self.repository.get(&report.id).unwrap_or(report);

        Ok(HarvestSubmissionResult {
            report,
            outcome,
            local_confirmation_number,
            synced,
        })
    }

    /// Submit the harvest of a failed report again as a new report. The
    /// failed report stays as it is.
    pub async fn resubmit(&self, failed_id: &str) -> Result<HarvestSubmissionResult> {
        let failed = self
            .repository
            .find(failed_id)
            .ok_or_else(|| Error::NotFound(failed_id.to_string()))?;
        if failed.dmf_status != ReportStatus::Failed {
            return Err(Error::validation(format!(
                "Report {} is {}, only failed reports can be resubmitted",
                failed.id, failed.dmf_status
            )));
        }
        info!("[HarvestReport] Resubmitting failed report {}", failed.id);
        self.submit_harvest(failed.harvest).await
    }

    /// Run one maintenance pass: drain the government queue, bring the
    /// backend up to date, retry failed deliveries and send the first
    /// delivery of every report that became confirmed during the pass.
    ///
    /// Connectivity is checked once up front. While offline nothing runs,
    /// so queued submissions keep their retry budget. Components are
    /// independent; one failing does not stop the others.
    pub async fn run_maintenance(&self, trigger: SyncCycleTrigger) -> MaintenanceSummary {
        info!("[HarvestReport] Maintenance pass triggered by {:?}", trigger);
        if !self.orchestrator.is_online().await {
            info!("[HarvestReport] Offline; maintenance deferred");
            return MaintenanceSummary {
                sync: Some(SyncCycleResult {
                    offline: true,
                    ..SyncCycleResult::default()
                }),
                drain: None,
                deliveries: None,
            };
        }

        let drain = self
            .queue
            .drain()
            .await
            .map_err(|err| error!("[HarvestReport] Submission queue drain failed: {}", err))
            .ok();
        let accepted = drain
            .as_ref()
            .map(|d| d.accepted_report_ids.clone())
            .unwrap_or_default();
        self.orchestrator.push_government_status(&accepted).await;

        let sync = self
            .orchestrator
            .sync_pending_connected()
            .await
            .map_err(|err| error!("[HarvestReport] Backend sync failed: {}", err))
            .ok();
        let deliveries = self
            .delivery
            .retry_failed_deliveries()
            .await
            .map_err(|err| warn!("[HarvestReport] Delivery retries failed: {}", err))
            .ok();

        let newly_synced = sync.iter().flat_map(|s| s.synced_ids.iter().cloned());
        self.deliver_first_confirmations(accepted.into_iter().chain(newly_synced))
            .await;

        MaintenanceSummary {
            sync,
            drain,
            deliveries,
        }
    }

    /// First delivery for confirmed reports that never had one.
    async fn deliver_first_confirmations(&self, report_ids: impl Iterator<Item = String>) {
        let mut seen = HashSet::new();
        for id in report_ids {
            let Some(report) = self.repository.find(&id) else {
                continue;
            };
            if !seen.insert(report.id.clone()) {
                continue;
            }
            if report.dmf_status != ReportStatus::Confirmed
                || report.webhook_status.is_some()
                || report.webhook_attempts > 0
            {
                continue;
            }
            self.delivery.deliver_for_report(&report).await;
        }
    }

    /// One probe, no backoff: the angler is waiting on the result.
    async fn persist_now(&self, report_id: &str) -> bool {
        if !self.connectivity.is_connected().await {
            info!(
                "[HarvestReport] Offline; report {} will sync later",
                report_id
            );
            return false;
        }
        match self.orchestrator.sync_report(report_id).await {
            Ok(_) => true,
            Err(failure) => {
                warn!(
                    "[HarvestReport] Immediate sync of report {} failed at {}: {}",
                    report_id, failure.stage, failure.error
                );
                false
            }
        }
    }
}
