//! In-memory fakes of every port, shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::delivery::{DeliveryPayload, DeliveryResult, DeliveryService};
use crate::errors::{Error, RemoteError, RemoteResult, Result};
use crate::identity::MemberIdentity;
use crate::remote::{
    CanonicalReportPayload, GovernmentStatusUpdate, OwnerDayAreaKey, RemoteReport, ReportBackend,
    Session, StoredReport,
};
use crate::reports::{HarvestInput, Report, Species, SpeciesCounts, WebhookUpdate};
use crate::storage::{KeyValueStore, StorageKey};
use crate::submissions::{GovernmentSubmissionClient, SubmissionOutcome};
use crate::sync::ConnectivityProbe;

pub fn harvest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
}

/// A valid harvest in `area_code` with aggregate counts only.
pub fn harvest_input(area_code: &str) -> HarvestInput {
    let mut species_counts = SpeciesCounts::default();
    species_counts.add(Species::RedDrum, 1);
    species_counts.add(Species::SpottedSeatrout, 2);
    HarvestInput {
        harvest_date: harvest_date(),
        area_code: area_code.to_string(),
        area_label: Some(format!("{} waters", area_code)),
        species_counts,
        fish_entries: Vec::new(),
        used_hook_and_line: true,
        gear_code: None,
        reporting_for: Default::default(),
        angler: Default::default(),
        photo_uri: None,
    }
}

pub fn device_report(id: &str, device_identity_id: &str, area_code: &str) -> Report {
    Report::new_pending(
        id,
        None,
        Some(device_identity_id.to_string()),
        harvest_input(area_code),
    )
}

/// A member with a finished opt-in.
pub fn member(member_id: &str, device_identity_id: Option<&str>) -> MemberIdentity {
    MemberIdentity {
        member_id: member_id.to_string(),
        device_identity_id: device_identity_id.map(str::to_string),
        email: Some(format!("{}@example.com", member_id)),
        display_name: None,
        has_completed_opt_in: true,
        opted_in_at: Some(Utc::now()),
    }
}

/// A backend row owned anonymously by `device_identity_id`.
pub fn remote_row(id: &str, device_identity_id: &str, area_code: &str) -> RemoteReport {
    let input = harvest_input(area_code);
    RemoteReport {
        id: id.to_string(),
        member_id: None,
        owner_anonymous_id: Some(device_identity_id.to_string()),
        harvest_date: input.harvest_date,
        area_code: input.area_code,
        area_label: input.area_label,
        species_counts: input.species_counts,
        angler: input.angler,
        dmf_status: Default::default(),
        dmf_confirmation_number: None,
        dmf_object_id: None,
        webhook_status: None,
        webhook_error: None,
        webhook_attempts: 0,
        created_at: Utc::now(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Store whose next reads fail as a locked database would.
pub struct FailingReads<S> {
    inner: S,
    failing_reads: AtomicUsize,
}

impl<S: KeyValueStore> FailingReads<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_reads: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_read(&self) {
        self.failing_reads.fetch_add(1, Ordering::SeqCst);
    }
}

impl<S: KeyValueStore> KeyValueStore for FailingReads<S> {
    fn get(&self, key: StorageKey) -> Result<Option<String>> {
        let armed = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(Error::storage("database is locked"));
        }
        self.inner.get(key)
    }

    fn set(&self, key: StorageKey, value: String) -> Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        self.inner.remove(key)
    }

    fn remove_many(&self, keys: &[StorageKey]) -> Result<()> {
        self.inner.remove_many(keys)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    RefreshSession,
    Create {
        client_report_id: String,
        member_id: String,
    },
    CreateAnonymous {
        client_report_id: String,
        device_identity_id: String,
        intended_member_id: Option<String>,
    },
    FindByObjectId(i64),
    FindByOwnerDayArea(OwnerDayAreaKey),
    ListFailedDeliveries,
    UpdateDelivery {
        report_id: String,
        attempts: u32,
    },
    UpdateGovernmentStatus {
        report_id: String,
        confirmation_number: String,
    },
    FindMember(String),
    Link {
        device_identity_id: String,
        member_id: String,
    },
}

#[derive(Default)]
struct FakeBackendState {
    session: Option<Session>,
    refresh_error: Option<RemoteError>,
    create_errors: VecDeque<RemoteError>,
    lookup_error: Option<RemoteError>,
    member_for_device: Option<MemberIdentity>,
    member_lookup_error: Option<RemoteError>,
    rows: Vec<RemoteReport>,
    calls: Vec<BackendCall>,
    next_id: usize,
}

/// Backend keeping its rows in memory. Creates insert rows, so dedup
/// lookups see them on the next cycle.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeBackendState>,
}

impl FakeBackend {
    fn with_state<T>(&self, f: impl FnOnce(&mut FakeBackendState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.with_state(|s| s.session = session);
    }

    /// Fail every session refresh with `error`.
    pub fn set_refresh_error(&self, error: Option<RemoteError>) {
        self.with_state(|s| s.refresh_error = error);
    }

    /// Fail the next create (either procedure) with `error`.
    pub fn push_create_error(&self, error: RemoteError) {
        self.with_state(|s| s.create_errors.push_back(error));
    }

    /// Fail every dedup lookup with `error`.
    pub fn set_lookup_error(&self, error: Option<RemoteError>) {
        self.with_state(|s| s.lookup_error = error);
    }

    pub fn set_member_for_device(&self, member: Option<MemberIdentity>) {
        self.with_state(|s| s.member_for_device = member);
    }

    pub fn set_member_lookup_error(&self, error: Option<RemoteError>) {
        self.with_state(|s| s.member_lookup_error = error);
    }

    pub fn insert_row(&self, row: RemoteReport) {
        self.with_state(|s| s.rows.push(row));
    }

    pub fn row(&self, id: &str) -> Option<RemoteReport> {
        self.with_state(|s| s.rows.iter().find(|r| r.id == id).cloned())
    }

    pub fn rows(&self) -> Vec<RemoteReport> {
        self.with_state(|s| s.rows.clone())
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.with_state(|s| s.calls.clone())
    }

    /// Create calls of either procedure.
    pub fn create_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Create { .. } | BackendCall::CreateAnonymous { .. }))
            .count()
    }

    fn insert_created(
        state: &mut FakeBackendState,
        payload: &CanonicalReportPayload,
        member_id: Option<String>,
        owner_anonymous_id: Option<String>,
    ) -> StoredReport {
        state.next_id += 1;
        let id = format!("remote-{}", state.next_id);
        let created_at = Utc::now();
        state.rows.push(RemoteReport {
            id: id.clone(),
            member_id,
            owner_anonymous_id: owner_anonymous_id.clone(),
            harvest_date: payload.harvest.harvest_date,
            area_code: payload.harvest.area_code.clone(),
            area_label: payload.harvest.area_label.clone(),
            species_counts: payload.harvest.species_counts,
            angler: payload.harvest.angler.clone(),
            dmf_status: payload.dmf_status,
            dmf_confirmation_number: payload.dmf_confirmation_number.clone(),
            dmf_object_id: payload.dmf_object_id,
            webhook_status: None,
            webhook_error: None,
            webhook_attempts: 0,
            created_at,
        });
        StoredReport {
            report_id: id,
            status: payload.dmf_status,
            owner_anonymous_id,
            created_at,
        }
    }
}

#[async_trait]
impl ReportBackend for FakeBackend {
    async fn refresh_session(&self) -> RemoteResult<Option<Session>> {
        self.with_state(|s| {
            s.calls.push(BackendCall::RefreshSession);
            match s.refresh_error.clone() {
                Some(err) => Err(err),
                None => Ok(s.session.clone()),
            }
        })
    }

    async fn create_report(
        &self,
        session: &Session,
        payload: &CanonicalReportPayload,
    ) -> RemoteResult<StoredReport> {
        self.with_state(|s| {
            s.calls.push(BackendCall::Create {
                client_report_id: payload.client_report_id.clone(),
                member_id: session.member_id.clone(),
            });
            if let Some(err) = s.create_errors.pop_front() {
                return Err(err);
            }
            Ok(Self::insert_created(
                s,
                payload,
                Some(session.member_id.clone()),
                None,
            ))
        })
    }

    async fn create_report_anonymous(
        &self,
        device_identity_id: &str,
        payload: &CanonicalReportPayload,
    ) -> RemoteResult<StoredReport> {
        self.with_state(|s| {
            s.calls.push(BackendCall::CreateAnonymous {
                client_report_id: payload.client_report_id.clone(),
                device_identity_id: device_identity_id.to_string(),
                intended_member_id: payload.intended_member_id.clone(),
            });
            if let Some(err) = s.create_errors.pop_front() {
                return Err(err);
            }
            Ok(Self::insert_created(
                s,
                payload,
                payload.intended_member_id.clone(),
                Some(device_identity_id.to_string()),
            ))
        })
    }

    async fn find_report_by_object_id(&self, object_id: i64) -> RemoteResult<Option<RemoteReport>> {
        self.with_state(|s| {
            s.calls.push(BackendCall::FindByObjectId(object_id));
            if let Some(err) = s.lookup_error.clone() {
                return Err(err);
            }
            Ok(s
                .rows
                .iter()
                .find(|r| r.dmf_object_id == Some(object_id))
                .cloned())
        })
    }

    async fn find_report_by_owner_day_area(
        &self,
        key: &OwnerDayAreaKey,
    ) -> RemoteResult<Option<RemoteReport>> {
        self.with_state(|s| {
            s.calls.push(BackendCall::FindByOwnerDayArea(key.clone()));
            if let Some(err) = s.lookup_error.clone() {
                return Err(err);
            }
            Ok(s
                .rows
                .iter()
                .find(|r| {
                    let owned = r.member_id.as_deref() == Some(key.owner_id.as_str())
                        || r.owner_anonymous_id.as_deref() == Some(key.owner_id.as_str());
                    owned && r.harvest_date == key.harvest_date && r.area_code == key.area_code
                })
                .cloned())
        })
    }

    async fn list_failed_deliveries(&self, max_attempts: u32) -> RemoteResult<Vec<RemoteReport>> {
        self.with_state(|s| {
            s.calls.push(BackendCall::ListFailedDeliveries);
            Ok(s
                .rows
                .iter()
                .filter(|r| {
                    r.webhook_status == Some(crate::reports::WebhookStatus::Failed)
                        && r.webhook_attempts < max_attempts
                })
                .cloned()
                .collect())
        })
    }

    async fn update_delivery_status(
        &self,
        report_id: &str,
        update: &WebhookUpdate,
    ) -> RemoteResult<()> {
        self.with_state(|s| {
            s.calls.push(BackendCall::UpdateDelivery {
                report_id: report_id.to_string(),
                attempts: update.webhook_attempts,
            });
            let row = s
                .rows
                .iter_mut()
                .find(|r| r.id == report_id)
                .ok_or_else(|| RemoteError::logical(format!("no report {}", report_id)))?;
            row.webhook_status = Some(update.webhook_status);
            row.webhook_error = update.webhook_error.clone();
            row.webhook_attempts = update.webhook_attempts;
            Ok(())
        })
    }

    async fn update_government_status(
        &self,
        report_id: &str,
        update: &GovernmentStatusUpdate,
    ) -> RemoteResult<()> {
        self.with_state(|s| {
            s.calls.push(BackendCall::UpdateGovernmentStatus {
                report_id: report_id.to_string(),
                confirmation_number: update.dmf_confirmation_number.clone(),
            });
            let row = s
                .rows
                .iter_mut()
                .find(|r| r.id == report_id)
                .ok_or_else(|| RemoteError::logical(format!("no report {}", report_id)))?;
            row.dmf_status = update.dmf_status;
            row.dmf_confirmation_number = Some(update.dmf_confirmation_number.clone());
            row.dmf_object_id = update.dmf_object_id;
            Ok(())
        })
    }

    async fn find_member_for_device(
        &self,
        device_identity_id: &str,
    ) -> RemoteResult<Option<MemberIdentity>> {
        self.with_state(|s| {
            s.calls
                .push(BackendCall::FindMember(device_identity_id.to_string()));
            if let Some(err) = s.member_lookup_error.clone() {
                return Err(err);
            }
            Ok(s.member_for_device.clone())
        })
    }

    async fn link_device_reports(
        &self,
        device_identity_id: &str,
        member_id: &str,
    ) -> RemoteResult<usize> {
        self.with_state(|s| {
            s.calls.push(BackendCall::Link {
                device_identity_id: device_identity_id.to_string(),
                member_id: member_id.to_string(),
            });
            let mut claimed = 0;
            for row in s.rows.iter_mut().filter(|r| {
                r.member_id.is_none() && r.owner_anonymous_id.as_deref() == Some(device_identity_id)
            }) {
                row.member_id = Some(member_id.to_string());
                claimed += 1;
            }
            Ok(claimed)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Government endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Accepts everything unless an outcome was scripted with `push_outcome`.
#[derive(Default)]
pub struct FakeGovernment {
    outcomes: Mutex<VecDeque<SubmissionOutcome>>,
    submitted: Mutex<Vec<HarvestInput>>,
}

impl FakeGovernment {
    pub fn push_outcome(&self, outcome: SubmissionOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn submitted_areas(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|input| input.area_code.clone())
            .collect()
    }
}

#[async_trait]
impl GovernmentSubmissionClient for FakeGovernment {
    async fn submit(&self, input: &HarvestInput) -> SubmissionOutcome {
        let count = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(input.clone());
            submitted.len()
        };
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| SubmissionOutcome::Accepted {
                confirmation_number: format!("DMF-{}", 1000 + count),
                object_id: Some(count as i64),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delivery service
// ─────────────────────────────────────────────────────────────────────────────

/// Succeeds unless a result was scripted with `push_result`.
#[derive(Default)]
pub struct FakeDelivery {
    results: Mutex<VecDeque<DeliveryResult>>,
    sent: Mutex<Vec<DeliveryPayload>>,
}

impl FakeDelivery {
    pub fn push_result(&self, result: DeliveryResult) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn sent(&self) -> Vec<DeliveryPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryService for FakeDelivery {
    async fn deliver(&self, payload: &DeliveryPayload) -> DeliveryResult {
        self.sent.lock().unwrap().push(payload.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(DeliveryResult::delivered)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connectivity
// ─────────────────────────────────────────────────────────────────────────────

/// Answers scripted probe results, then `fallback` once the script runs out.
pub struct FakeConnectivity {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    probes: Mutex<usize>,
}

impl FakeConnectivity {
    pub fn online() -> Self {
        Self::scripted(Vec::new(), true)
    }

    pub fn offline() -> Self {
        Self::scripted(Vec::new(), false)
    }

    pub fn scripted(script: Vec<bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            probes: Mutex::new(0),
        }
    }

    pub fn probes(&self) -> usize {
        *self.probes.lock().unwrap()
    }
}

#[async_trait]
impl ConnectivityProbe for FakeConnectivity {
    async fn is_connected(&self) -> bool {
        *self.probes.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
