use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::Result;
use crate::reports::{HarvestInput, LocalReportRepository, ReportStatus, ReportUpdate, StatusUpdate};
use crate::storage::{
    load_records, read_records, save_records, KeyValueStore, StorageKey, StoredRecords,
};

use super::{
    generate_local_confirmation_number, DrainSummary, GovernmentSubmissionClient,
    OfflineSubmissionEntry, SubmissionHistoryEntry, SubmissionOutcome,
};

/// Durable FIFO of government submissions that could not be sent.
///
/// Independent of the backend pending-sync index: a report can be confirmed
/// by the government endpoint while still waiting for the backend, or the
/// other way round.
pub struct OfflineSubmissionQueue {
    store: Arc<dyn KeyValueStore>,
    repository: Arc<LocalReportRepository>,
    client: Arc<dyn GovernmentSubmissionClient>,
    max_retries: u32,
    history_cap: usize,
}

impl OfflineSubmissionQueue {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        repository: Arc<LocalReportRepository>,
        client: Arc<dyn GovernmentSubmissionClient>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            repository,
            client,
            max_retries: config.submission_max_retries,
            history_cap: config.submission_history_cap,
        }
    }

    /// Queued submissions in the order they will be sent.
    pub fn entries(&self) -> Vec<OfflineSubmissionEntry> {
        read_records(self.store.as_ref(), StorageKey::SubmissionQueue)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Government-confirmed submissions, most recent first.
    pub fn history(&self) -> Vec<SubmissionHistoryEntry> {
        self.repository.history()
    }

    fn load_entries(&self) -> Result<StoredRecords<OfflineSubmissionEntry>> {
        load_records(self.store.as_ref(), StorageKey::SubmissionQueue)
    }

    fn save_entries(&self, stored: &StoredRecords<OfflineSubmissionEntry>) -> Result<()> {
        save_records(self.store.as_ref(), StorageKey::SubmissionQueue, stored)
    }

    /// Apply `change` to the stored entry `id`, re-reading the queue first so
    /// entries queued in the meantime are kept. `None` drops the entry.
    fn modify_entry(
        &self,
        id: &str,
        change: impl FnOnce(OfflineSubmissionEntry) -> Option<OfflineSubmissionEntry>,
    ) -> Result<()> {
        let mut stored = self.load_entries()?;
        let Some(position) = stored.records.iter().position(|e| e.id == id) else {
            debug!("[SubmissionQueue] Entry {} left the queue during the drain", id);
            return Ok(());
        };
        let entry = stored.records.remove(position);
        if let Some(entry) = change(entry) {
            stored.records.insert(position, entry);
        }
        self.save_entries(&stored)
    }

    /// Queue a submission and return the local confirmation number.
    pub fn enqueue(&self, input: HarvestInput) -> Result<String> {
        self.enqueue_entry(input, None, None)
    }

    /// Queue a submission that belongs to a local report.
    pub fn enqueue_for_report(
        &self,
        input: HarvestInput,
        report_id: &str,
        last_error: Option<String>,
    ) -> Result<String> {
        self.enqueue_entry(input, Some(report_id.to_string()), last_error)
    }

    fn enqueue_entry(
        &self,
        input: HarvestInput,
        report_id: Option<String>,
        last_error: Option<String>,
    ) -> Result<String> {
        input.validate()?;
        let now = Utc::now();
        let entry = OfflineSubmissionEntry {
            id: Uuid::new_v4().to_string(),
            input,
            report_id,
            queued_at: now,
            local_confirmation_number: generate_local_confirmation_number(now),
            retry_count: 0,
            last_error,
            last_attempt_at: None,
        };

        let mut stored = self.load_entries()?;
        stored.records.push(entry.clone());
        self.save_entries(&stored)?;
        info!(
            "[SubmissionQueue] Queued submission {} for area {} ({} waiting)",
            entry.local_confirmation_number,
            entry.input.area_code,
            stored.records.len()
        );
        Ok(entry.local_confirmation_number)
    }

    /// Send every queued submission once, oldest first.
    ///
    /// Entries that already used their retry budget are expired before any
    /// network call. Each outcome is written back to the stored queue by
    /// entry id as soon as it is known, so submissions queued while the drain
    /// waits on the network are kept and picked up by the next drain.
    pub async fn drain(&self) -> Result<DrainSummary> {
        let snapshot = self.load_entries()?.records;
        let mut summary = DrainSummary::default();
        if snapshot.is_empty() {
            return Ok(summary);
        }
        debug!("[SubmissionQueue] Draining {} submissions", snapshot.len());

        for mut entry in snapshot {
            if entry.retry_count >= self.max_retries {
                error!(
                    "[SubmissionQueue] Submission {} (area {}, queued {}) expired after {} attempts; last error: {}",
                    entry.local_confirmation_number,
                    entry.input.area_code,
                    entry.queued_at.to_rfc3339(),
                    entry.retry_count,
                    entry.last_error.as_deref().unwrap_or("none")
                );
                self.modify_entry(&entry.id, |_| None)?;
                summary.expired += 1;
                summary.expired_entries.push(entry);
                continue;
            }

            let attempted_at = Utc::now();
            match self.client.submit(&entry.input).await {
                SubmissionOutcome::Accepted {
                    confirmation_number,
                    object_id,
                } => {
                    // Leaves the queue before any bookkeeping runs.
                    self.modify_entry(&entry.id, |_| None)?;
                    summary.synced += 1;
                    if let Some(report_id) =
                        self.record_success(&entry, confirmation_number, object_id)
                    {
                        summary.accepted_report_ids.push(report_id);
                    }
                }
                outcome => {
                    entry.retry_count += 1;
                    entry.last_error = outcome.error().map(str::to_string);
                    entry.last_attempt_at = Some(attempted_at);
                    warn!(
                        "[SubmissionQueue] Submission {} failed (attempt {}/{}): {}",
                        entry.local_confirmation_number,
                        entry.retry_count,
                        self.max_retries,
                        entry.last_error.as_deref().unwrap_or("unknown error")
                    );
                    let retry_count = entry.retry_count;
                    let last_error = entry.last_error.clone();
                    self.modify_entry(&entry.id, |mut stored| {
                        stored.retry_count = retry_count;
                        stored.last_error = last_error;
                        stored.last_attempt_at = Some(attempted_at);
                        Some(stored)
                    })?;
                    summary.failed += 1;
                }
            }
        }

        info!(
            "[SubmissionQueue] Drain finished: synced={}, failed={}, expired={}",
            summary.synced, summary.failed, summary.expired
        );
        Ok(summary)
    }

    /// Bookkeeping after the endpoint accepted `entry`, which has already
    /// left the queue. Failures are logged; the submission itself is done.
    /// Returns the local report that moved to submitted or confirmed.
    fn record_success(
        &self,
        entry: &OfflineSubmissionEntry,
        confirmation_number: String,
        object_id: Option<i64>,
    ) -> Option<String> {
        info!(
            "[SubmissionQueue] Submission {} confirmed as {}",
            entry.local_confirmation_number, confirmation_number
        );
        if let Err(err) = self.repository.record_history(
            SubmissionHistoryEntry {
                confirmation_number: confirmation_number.clone(),
                local_confirmation_number: Some(entry.local_confirmation_number.clone()),
                object_id,
                report_id: entry.report_id.clone(),
                input: entry.input.clone(),
                submitted_at: Utc::now(),
            },
            self.history_cap,
        ) {
            error!(
                "[SubmissionQueue] Failed to record history for {} ({}): {}",
                entry.local_confirmation_number, confirmation_number, err
            );
        }

        let report_id = entry.report_id.as_deref()?;
        match self.repository.find(report_id) {
            Some(report) if report.dmf_status == ReportStatus::Pending => {
                let updated = match self.repository.update(
                    &report.id,
                    ReportUpdate::status(StatusUpdate::submitted(
                        confirmation_number.clone(),
                        object_id,
                    )),
                ) {
                    Ok(updated) => updated,
                    Err(err) => {
                        error!(
                            "[SubmissionQueue] Failed to mark report {} submitted as {}: {}",
                            report.id, confirmation_number, err
                        );
                        return None;
                    }
                };
                // Already on the backend: nothing left to wait for.
                if updated.synced_at.is_some() {
                    if let Err(err) = self.repository.update(
                        &updated.id,
                        ReportUpdate::status(StatusUpdate::confirmed_from(&updated)),
                    ) {
                        warn!(
                            "[SubmissionQueue] Failed to confirm report {}: {}",
                            updated.id, err
                        );
                    }
                }
                Some(updated.id)
            }
            Some(report) => {
                debug!(
                    "[SubmissionQueue] Report {} already {}, leaving status untouched",
                    report.id, report.dmf_status
                );
                None
            }
            None => {
                warn!(
                    "[SubmissionQueue] Report {} for submission {} no longer exists locally",
                    report_id, entry.local_confirmation_number
                );
                None
            }
        }
    }
}
