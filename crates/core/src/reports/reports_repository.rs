//! Device-local report collection, pending-sync index and submission history.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::storage::{
    load_json, load_records, read_json, read_records, save_records, write_json, KeyValueStore,
    StorageKey, StoredRecords,
};
use crate::submissions::SubmissionHistoryEntry;

use super::{Report, ReportUpdate};

/// Default soft limit for the pending-sync index.
pub const DEFAULT_PENDING_SOFT_CAP: usize = 500;

/// Pure data access over the local store. No network.
///
/// Every call reads the full collection, mutates it and writes it back. A
/// process killed between the read and the write loses that mutation; the
/// sync orchestrator's dedup step compensates for it.
pub struct LocalReportRepository {
    store: Arc<dyn KeyValueStore>,
    pending_soft_cap: usize,
}

impl LocalReportRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            pending_soft_cap: DEFAULT_PENDING_SOFT_CAP,
        }
    }

    pub fn with_pending_soft_cap(mut self, cap: usize) -> Self {
        self.pending_soft_cap = cap;
        self
    }

    /// Lenient load for reads: unreadable storage yields an empty list.
    fn load_reports(&self) -> Vec<Report> {
        read_records::<Report>(self.store.as_ref(), StorageKey::Reports)
            .into_iter()
            .map(Report::normalize)
            .collect()
    }

    /// Strict load for read-modify-write paths.
    fn load_for_write(&self) -> Result<StoredRecords<Report>> {
        let mut stored = load_records::<Report>(self.store.as_ref(), StorageKey::Reports)?;
        stored.records = stored.records.into_iter().map(Report::normalize).collect();
        Ok(stored)
    }

    fn save_reports(&self, stored: &StoredRecords<Report>) -> Result<()> {
        save_records(self.store.as_ref(), StorageKey::Reports, stored)
    }

    /// All reports, normalized to the current schema. Unreadable storage
    /// yields an empty list.
    pub fn list(&self) -> Vec<Report> {
        self.load_reports()
    }

    pub fn get(&self, id: &str) -> Option<Report> {
        self.load_reports().into_iter().find(|r| r.id == id)
    }

    /// Look a report up by its current id or the local id it had before sync.
    pub fn find(&self, id: &str) -> Option<Report> {
        self.load_reports()
            .into_iter()
            .find(|r| r.id == id || r.local_id.as_deref() == Some(id))
    }

    pub fn add(&self, report: Report) -> Result<Report> {
        report.validate()?;
        let mut stored = self.load_for_write()?;
        if stored.records.iter().any(|r| r.id == report.id) {
            return Err(Error::validation(format!(
                "Report {} already exists locally",
                report.id
            )));
        }
        stored.records.push(report.clone());
        self.save_reports(&stored)?;
        debug!("[Storage] Added report {}", report.id);
        Ok(report)
    }

    pub fn update(&self, id: &str, update: ReportUpdate) -> Result<Report> {
        let mut stored = self.load_for_write()?;
        let report = stored
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        update.apply_to(report)?;
        let updated = report.clone();
        self.save_reports(&stored)?;
        Ok(updated)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut stored = self.load_for_write()?;
        let before = stored.records.len();
        stored.records.retain(|r| r.id != id);
        if stored.records.len() == before {
            return Ok(false);
        }
        self.save_reports(&stored)?;
        Ok(true)
    }

    /// Store `report` under the id the backend assigned to it.
    ///
    /// Any copy under the local id or the remote id is replaced, so calling
    /// this twice for the same pair leaves a single record.
    pub fn save_synced(
        &self,
        mut report: Report,
        remote_id: &str,
        owner_anonymous_id: Option<&str>,
    ) -> Result<Report> {
        let local_id = report.id.clone();
        let mut stored = self.load_for_write()?;
        stored.records.retain(|r| r.id != local_id && r.id != remote_id);

        if local_id != remote_id && report.local_id.is_none() {
            report.local_id = Some(local_id.clone());
        }
        report.id = remote_id.to_string();
        if report.device_identity_id.is_none() {
            report.device_identity_id = owner_anonymous_id.map(str::to_string);
        }
        let now = Utc::now();
        report.synced_at = Some(now);
        report.updated_at = now;
        let report = report.normalize();

        stored.records.push(report.clone());
        self.save_reports(&stored)?;
        if local_id != remote_id {
            debug!("[Storage] Report {} adopted remote id {}", local_id, remote_id);
        }
        Ok(report)
    }

    /// Give reports owned only by `device_identity_id` to `member_id`.
    /// Reports that already have a member owner are left alone.
    pub fn claim_for_member(&self, device_identity_id: &str, member_id: &str) -> Result<usize> {
        let mut stored = self.load_for_write()?;
        let mut claimed = 0;
        let now = Utc::now();
        for report in stored.records.iter_mut().filter(|r| {
            r.member_id.is_none() && r.device_identity_id.as_deref() == Some(device_identity_id)
        }) {
            report.member_id = Some(member_id.to_string());
            report.updated_at = now;
            claimed += 1;
        }
        if claimed > 0 {
            self.save_reports(&stored)?;
        }
        Ok(claimed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pending-sync index
    // ─────────────────────────────────────────────────────────────────────────

    pub fn pending_ids(&self) -> Vec<String> {
        read_json::<Vec<String>>(self.store.as_ref(), StorageKey::PendingSync).unwrap_or_default()
    }

    fn load_pending(&self) -> Result<Vec<String>> {
        Ok(load_json(self.store.as_ref(), StorageKey::PendingSync)?.unwrap_or_default())
    }

    pub fn mark_pending(&self, id: &str) -> Result<()> {
        let mut ids = self.load_pending()?;
        if ids.iter().any(|existing| existing == id) {
            return Ok(());
        }
        ids.push(id.to_string());
        if ids.len() > self.pending_soft_cap {
            warn!(
                "[Storage] Pending-sync index holds {} reports (soft cap {}); device may have been offline for a long time",
                ids.len(),
                self.pending_soft_cap
            );
        }
        write_json(self.store.as_ref(), StorageKey::PendingSync, &ids)
    }

    pub fn clear_pending(&self, id: &str) -> Result<bool> {
        let mut ids = self.load_pending()?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() == before {
            return Ok(false);
        }
        write_json(self.store.as_ref(), StorageKey::PendingSync, &ids)?;
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission history
    // ─────────────────────────────────────────────────────────────────────────

    /// Government-confirmed submissions, most recent first.
    pub fn history(&self) -> Vec<SubmissionHistoryEntry> {
        read_json(self.store.as_ref(), StorageKey::SubmissionHistory).unwrap_or_default()
    }

    pub fn record_history(&self, entry: SubmissionHistoryEntry, cap: usize) -> Result<()> {
        let mut history: Vec<SubmissionHistoryEntry> =
            load_json(self.store.as_ref(), StorageKey::SubmissionHistory)?.unwrap_or_default();
        history.insert(0, entry);
        history.truncate(cap);
        write_json(self.store.as_ref(), StorageKey::SubmissionHistory, &history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{ReportStatus, StatusUpdate, WebhookStatus};
    use crate::storage::InMemoryKeyValueStore;
    use crate::testing::{device_report, harvest_input, FailingReads};

    fn repository() -> (Arc<InMemoryKeyValueStore>, LocalReportRepository) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let repo = LocalReportRepository::new(store.clone());
        (store, repo)
    }

    #[test]
    fn add_get_and_list() {
        let (_store, repo) = repository();
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        repo.add(device_report("r2", "device-1", "PAMLICO")).expect("add");

        assert_eq!(repo.list().len(), 2);
        assert_eq!(
            repo.get("r2").map(|r| r.harvest.area_code),
            Some("PAMLICO".to_string())
        );
        assert!(repo.get("missing").is_none());
    }

    #[test]
    fn add_rejects_duplicate_ids() {
        let (_store, repo) = repository();
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        assert!(repo.add(device_report("r1", "device-1", "CORE")).is_err());
    }

    #[test]
    fn corrupt_storage_lists_as_empty() {
        let (store, repo) = repository();
        store
            .set(StorageKey::Reports, "definitely not json".to_string())
            .expect("set");
        assert!(repo.list().is_empty());
    }

    #[test]
    fn list_normalizes_records_without_webhook_bookkeeping() {
        let (store, repo) = repository();
        let legacy = serde_json::json!([{
            "id": "legacy-1",
            "deviceIdentityId": "device-1",
            "dmfStatus": "submitted",
            "dmfConfirmationNumber": "DMF-123",
            "harvest": {
                "harvestDate": "2025-08-10",
                "areaCode": "NEUSE",
                "speciesCounts": { "redDrum": 1 }
            },
            "createdAt": "2025-08-10T12:00:00Z",
            "updatedAt": "2025-08-10T12:00:00Z"
        }]);
        store
            .set(StorageKey::Reports, legacy.to_string())
            .expect("set");

        let reports = repo.list();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.webhook_attempts, 0);
        assert_eq!(report.webhook_status, None);
        assert_eq!(report.webhook_error, None);
        assert_eq!(report.dmf_status, ReportStatus::Submitted);
        assert_eq!(report.dmf_confirmation_number.as_deref(), Some("DMF-123"));
        assert_eq!(report.harvest.area_code, "NEUSE");
        assert_eq!(report.harvest.species_counts.red_drum, 1);
    }

    #[test]
    fn unreadable_record_is_skipped_not_fatal() {
        let (store, repo) = repository();
        let good = serde_json::to_value(device_report("r1", "device-1", "CORE")).expect("json");
        let raw = serde_json::json!([good, { "id": 7 }]);
        store.set(StorageKey::Reports, raw.to_string()).expect("set");

        let reports = repo.list();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "r1");
    }

    #[test]
    fn failed_read_aborts_add_without_touching_stored_reports() {
        let store = Arc::new(FailingReads::new(InMemoryKeyValueStore::new()));
        let repo = LocalReportRepository::new(store.clone());
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        repo.add(device_report("r2", "device-1", "CORE")).expect("add");

        store.fail_next_read();
        let err = repo
            .add(device_report("r3", "device-1", "CORE"))
            .expect_err("locked store");
        assert!(matches!(err, Error::Storage(_)));

        store.fail_next_read();
        assert!(repo.update("r1", ReportUpdate::default()).is_err());
        store.fail_next_read();
        assert!(repo.claim_for_member("device-1", "member-1").is_err());
        store.fail_next_read();
        assert!(repo.mark_pending("r3").is_err());

        let ids = repo.list().into_iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["r1", "r2"]);
        repo.add(device_report("r3", "device-1", "CORE")).expect("add after recovery");
        assert_eq!(repo.list().len(), 3);
    }

    #[test]
    fn unreadable_record_survives_later_writes() {
        let (store, repo) = repository();
        let good = serde_json::to_value(device_report("r1", "device-1", "CORE")).expect("json");
        let damaged = serde_json::json!({ "id": 7, "note": "written by a newer app" });
        let raw = serde_json::json!([good, damaged.clone()]);
        store.set(StorageKey::Reports, raw.to_string()).expect("set");

        repo.add(device_report("r2", "device-1", "CORE")).expect("add");
        repo.update("r1", ReportUpdate::status(StatusUpdate::submitted("DMF-1", None)))
            .expect("update");

        let stored: Vec<serde_json::Value> =
            serde_json::from_str(&store.get(StorageKey::Reports).expect("get").expect("value"))
                .expect("array");
        assert_eq!(stored.len(), 3);
        assert!(stored.contains(&damaged));
        assert_eq!(repo.list().len(), 2);
    }

    #[test]
    fn failed_status_update_replaces_confirmation_number() {
        let (_store, repo) = repository();
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        repo.update("r1", ReportUpdate::status(StatusUpdate::submitted("DMF-999", Some(42))))
            .expect("submit");

        let updated = repo
            .update(
                "r1",
                ReportUpdate::status(StatusUpdate {
                    dmf_status: ReportStatus::Failed,
                    dmf_error: Some("x".to_string()),
                    ..Default::default()
                }),
            )
            .expect("fail");

        assert_eq!(updated.dmf_status, ReportStatus::Failed);
        assert_eq!(updated.dmf_error.as_deref(), Some("x"));
        assert_eq!(updated.dmf_confirmation_number, None);
        assert_eq!(updated.dmf_object_id, None);
    }

    #[test]
    fn failed_status_update_keeps_resupplied_confirmation_number() {
        let (_store, repo) = repository();
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        repo.update("r1", ReportUpdate::status(StatusUpdate::submitted("DMF-999", None)))
            .expect("submit");

        let updated = repo
            .update(
                "r1",
                ReportUpdate::status(StatusUpdate {
                    dmf_status: ReportStatus::Failed,
                    dmf_error: Some("x".to_string()),
                    dmf_confirmation_number: Some("DMF-999".to_string()),
                    ..Default::default()
                }),
            )
            .expect("fail");

        assert_eq!(updated.dmf_confirmation_number.as_deref(), Some("DMF-999"));
    }

    #[test]
    fn invalid_transition_is_rejected_and_not_persisted() {
        let (_store, repo) = repository();
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        let err = repo
            .update(
                "r1",
                ReportUpdate::status(StatusUpdate {
                    dmf_status: ReportStatus::Confirmed,
                    dmf_confirmation_number: Some("DMF-1".to_string()),
                    ..Default::default()
                }),
            )
            .expect_err("pending -> confirmed");
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(repo.get("r1").map(|r| r.dmf_status), Some(ReportStatus::Pending));
    }

    #[test]
    fn webhook_update_sets_bookkeeping() {
        let (_store, repo) = repository();
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        let updated = repo
            .update(
                "r1",
                ReportUpdate::webhook(crate::reports::WebhookUpdate {
                    webhook_status: WebhookStatus::Failed,
                    webhook_error: Some("sms gateway down".to_string()),
                    webhook_attempts: 1,
                }),
            )
            .expect("update");
        assert_eq!(updated.webhook_status, Some(WebhookStatus::Failed));
        assert_eq!(updated.webhook_attempts, 1);
    }

    #[test]
    fn update_missing_report_is_not_found() {
        let (_store, repo) = repository();
        let err = repo
            .update("nope", ReportUpdate::default())
            .expect_err("missing");
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn save_synced_rekeys_the_local_record_once() {
        let (_store, repo) = repository();
        let report = repo.add(device_report("local-1", "device-1", "CORE")).expect("add");

        repo.save_synced(report.clone(), "remote-9", None).expect("sync");
        repo.save_synced(report, "remote-9", None).expect("sync again");

        let reports = repo.list();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "remote-9");
        assert!(reports[0].synced_at.is_some());
        assert!(repo.get("local-1").is_none());
        assert_eq!(repo.find("local-1").map(|r| r.id), Some("remote-9".to_string()));
    }

    #[test]
    fn pending_index_is_a_set_in_insertion_order() {
        let (_store, repo) = repository();
        repo.mark_pending("a").expect("mark");
        repo.mark_pending("b").expect("mark");
        repo.mark_pending("a").expect("mark");
        assert_eq!(repo.pending_ids(), vec!["a".to_string(), "b".to_string()]);

        assert!(repo.clear_pending("a").expect("clear"));
        assert!(!repo.clear_pending("a").expect("clear twice"));
        assert_eq!(repo.pending_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn claim_for_member_only_takes_unlinked_device_reports() {
        let (_store, repo) = repository();
        repo.add(device_report("r1", "device-1", "CORE")).expect("add");
        repo.add(device_report("r2", "device-2", "CORE")).expect("add");
        repo.add(Report::new_pending(
            "r3",
            Some("member-other".to_string()),
            None,
            harvest_input("CORE"),
        ))
        .expect("add");

        assert_eq!(repo.claim_for_member("device-1", "member-1").expect("claim"), 1);
        assert_eq!(repo.claim_for_member("device-1", "member-1").expect("claim"), 0);

        assert_eq!(
            repo.get("r1").and_then(|r| r.member_id),
            Some("member-1".to_string())
        );
        assert_eq!(repo.get("r2").and_then(|r| r.member_id), None);
        assert_eq!(
            repo.get("r3").and_then(|r| r.member_id),
            Some("member-other".to_string())
        );
    }

    #[test]
    fn history_is_head_inserted_and_capped() {
        let (_store, repo) = repository();
        for n in 0..4 {
            repo.record_history(
                SubmissionHistoryEntry {
                    confirmation_number: format!("DMF-{}", n),
                    local_confirmation_number: None,
                    object_id: None,
                    report_id: None,
                    input: harvest_input("CORE"),
                    submitted_at: Utc::now(),
                },
                3,
            )
            .expect("record");
        }
        let numbers = repo
            .history()
            .into_iter()
            .map(|h| h.confirmation_number)
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec!["DMF-3", "DMF-2", "DMF-1"]);
    }
}
