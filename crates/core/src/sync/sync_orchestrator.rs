//! Moves locally persisted reports to the application backend.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::{Error, Result};
use crate::remote::{
    GovernmentStatusUpdate, OwnerDayAreaKey, RemotePersistenceClient, RemoteReport, ReportBackend,
};
use crate::reports::{LocalReportRepository, Report, ReportStatus, ReportUpdate, StatusUpdate};

use super::{probe_with_backoff, ConnectivityProbe, SyncCycleResult, SyncItemOutcome, SyncStage};

/// A per-report failure and the step it happened at.
#[derive(Debug)]
pub struct SyncItemFailure {
    pub stage: SyncStage,
    pub error: Error,
}

impl SyncItemFailure {
    fn at(stage: SyncStage) -> impl FnOnce(Error) -> Self {
        move |error| Self { stage, error }
    }
}

/// Drains the pending-sync index.
///
/// Each report is checked against the backend before it is created, which
/// makes a sync idempotent even when an earlier run created the row but died
/// before clearing the index.
pub struct SyncOrchestrator {
    repository: Arc<LocalReportRepository>,
    backend: Arc<dyn ReportBackend>,
    persistence: Arc<RemotePersistenceClient>,
    connectivity: Arc<dyn ConnectivityProbe>,
    config: EngineConfig,
}

impl SyncOrchestrator {
    pub fn new(
        repository: Arc<LocalReportRepository>,
        backend: Arc<dyn ReportBackend>,
        persistence: Arc<RemotePersistenceClient>,
        connectivity: Arc<dyn ConnectivityProbe>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repository,
            backend,
            persistence,
            connectivity,
            config,
        }
    }

    /// Whether the backend is reachable, retrying with backoff before
    /// giving up.
    pub async fn is_online(&self) -> bool {
        probe_with_backoff(self.connectivity.as_ref(), &self.config).await
    }

    /// Sync every report in the pending index, in insertion order.
    ///
    /// A failing report is counted and left in the index; the remaining
    /// reports are still attempted.
    pub async fn sync_pending(&self) -> Result<SyncCycleResult> {
        let pending = self.repository.pending_ids();
        if pending.is_empty() {
            return Ok(SyncCycleResult::default());
        }

        if !self.is_online().await {
            info!(
                "[ReportSync] Offline; leaving {} pending reports for the next cycle",
                pending.len()
            );
            return Ok(SyncCycleResult {
                offline: true,
                ..SyncCycleResult::default()
            });
        }
        Ok(self.sync_ids(pending).await)
    }

    /// [`Self::sync_pending`] for a caller that has already established
    /// connectivity.
    pub async fn sync_pending_connected(&self) -> Result<SyncCycleResult> {
        let pending = self.repository.pending_ids();
        if pending.is_empty() {
            return Ok(SyncCycleResult::default());
        }
        Ok(self.sync_ids(pending).await)
    }

    async fn sync_ids(&self, pending: Vec<String>) -> SyncCycleResult {
        let mut result = SyncCycleResult::default();
        info!("[ReportSync] Syncing {} pending reports", pending.len());
        for id in pending {
            match self.sync_one(&id).await {
                Ok(SyncItemOutcome::Pruned) => result.pruned += 1,
                Ok(outcome) => {
                    debug!("[ReportSync] Report {} synced: {:?}", id, outcome);
                    result.synced += 1;
                    if let SyncItemOutcome::Created { remote_id }
                    | SyncItemOutcome::Deduplicated { remote_id }
                    | SyncItemOutcome::AlreadySynced { remote_id } = outcome
                    {
                        result.synced_ids.push(remote_id);
                    }
                }
                Err(failure) => {
                    warn!(
                        "[ReportSync] Report {} failed at {}: {}",
                        id, failure.stage, failure.error
                    );
                    result.failed += 1;
                }
            }
        }

        info!(
            "[ReportSync] Sync cycle finished: synced={} failed={} pruned={}",
            result.synced, result.failed, result.pruned
        );
        result
    }

    /// Write the government confirmation onto the backend rows of reports
    /// that were synced before the endpoint accepted them. A row that cannot
    /// be updated goes back into the pending index, where the dedup step of
    /// the next sync retries the update. Returns how many rows were updated.
    pub async fn push_government_status(&self, report_ids: &[String]) -> usize {
        let mut pushed = 0;
        for id in report_ids {
            let Some(report) = self.repository.find(id) else {
                continue;
            };
            if report.synced_at.is_none() {
                continue;
            }
            let Some(update) = GovernmentStatusUpdate::accepted(&report) else {
                continue;
            };
            match self.backend.update_government_status(&report.id, &update).await {
                Ok(()) => {
                    debug!(
                        "[ReportSync] Report {} now carries confirmation {}",
                        report.id, update.dmf_confirmation_number
                    );
                    pushed += 1;
                }
                Err(err) => {
                    warn!(
                        "[ReportSync] Could not record confirmation {} on report {}: {}",
                        update.dmf_confirmation_number, report.id, err
                    );
                    if let Err(err) = self.repository.mark_pending(&report.id) {
                        warn!(
                            "[ReportSync] Could not requeue report {}: {}",
                            report.id, err
                        );
                    }
                }
            }
        }
        pushed
    }

    /// Sync a single report immediately, regardless of its position in the
    /// index. Used right after a report is saved while online.
    pub async fn sync_report(
        &self,
        id: &str,
    ) -> std::result::Result<SyncItemOutcome, SyncItemFailure> {
        self.sync_one(id).await
    }

    async fn sync_one(&self, id: &str) -> std::result::Result<SyncItemOutcome, SyncItemFailure> {
        let Some(mut report) = self.repository.find(id) else {
            warn!("[ReportSync] Pending report {} no longer exists; pruning", id);
            self.clear_pending(id).map_err(SyncItemFailure::at(SyncStage::Reconcile))?;
            return Ok(SyncItemOutcome::Pruned);
        };

        if report.synced_at.is_some() && report.id != id {
            let remote_id = report.id.clone();
            self.clear_pending(id).map_err(SyncItemFailure::at(SyncStage::Reconcile))?;
            self.confirm_submitted(&remote_id);
            return Ok(SyncItemOutcome::AlreadySynced { remote_id });
        }

        report.ensure_fish_entries();

        let existing = self
            .find_existing(&report)
            .await
            .map_err(SyncItemFailure::at(SyncStage::Dedup))?;

        let outcome = match existing {
            Some(remote) => {
                info!(
                    "[ReportSync] Report {} already exists remotely as {}; adopting",
                    id, remote.id
                );
                if remote.dmf_confirmation_number.is_none() {
                    if let Some(update) = GovernmentStatusUpdate::accepted(&report) {
                        self.backend
                            .update_government_status(&remote.id, &update)
                            .await
                            .map_err(Error::from)
                            .map_err(SyncItemFailure::at(SyncStage::Reconcile))?;
                    }
                }
                self.repository
                    .save_synced(report, &remote.id, remote.owner_anonymous_id.as_deref())
                    .map_err(SyncItemFailure::at(SyncStage::Reconcile))?;
                SyncItemOutcome::Deduplicated {
                    remote_id: remote.id,
                }
            }
            None => {
                let stored = self
                    .persistence
                    .create(&report)
                    .await
                    .map_err(SyncItemFailure::at(SyncStage::Create))?;
                SyncItemOutcome::Created {
                    remote_id: stored.report_id,
                }
            }
        };

        self.clear_pending(id).map_err(SyncItemFailure::at(SyncStage::Reconcile))?;
        if let SyncItemOutcome::Created { remote_id } | SyncItemOutcome::Deduplicated { remote_id } =
            &outcome
        {
            self.confirm_submitted(remote_id);
        }
        Ok(outcome)
    }

    /// Look for a backend row that already represents `report`.
    ///
    /// The government object id is authoritative. The owner/day/area key is
    /// a fallback that can match two distinct trips on the same day, so a
    /// row carrying a different object id is never adopted through it.
    async fn find_existing(&self, report: &Report) -> Result<Option<RemoteReport>> {
        if let Some(object_id) = report.dmf_object_id {
            if let Some(remote) = self.backend.find_report_by_object_id(object_id).await? {
                return Ok(Some(remote));
            }
        }

        let Some(key) = OwnerDayAreaKey::for_report(report) else {
            return Ok(None);
        };
        let candidate = self.backend.find_report_by_owner_day_area(&key).await?;
        Ok(candidate.filter(|remote| match (report.dmf_object_id, remote.dmf_object_id) {
            (Some(local), Some(found)) => local == found,
            _ => true,
        }))
    }

    fn clear_pending(&self, id: &str) -> Result<()> {
        self.repository.clear_pending(id).map(|_| ())
    }

    /// A submitted report whose backend row is durable becomes confirmed.
    fn confirm_submitted(&self, remote_id: &str) {
        let Some(report) = self.repository.get(remote_id) else {
            return;
        };
        if report.dmf_status != ReportStatus::Submitted {
            return;
        }
        if let Err(err) = self.repository.update(
            remote_id,
            ReportUpdate::status(StatusUpdate::confirmed_from(&report)),
        ) {
            warn!(
                "[ReportSync] Could not confirm report {}: {}",
                remote_id, err
            );
        }
    }
}
