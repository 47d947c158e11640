//! Wire-level shapes exchanged with the application backend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::reports::{
    AnglerContact, HarvestInput, Report, ReportStatus, SpeciesCounts, WebhookStatus,
    REPORT_SCHEMA_VERSION,
};

/// A validated backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub member_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Canonical report body accepted by both create procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalReportPayload {
    pub schema_version: u32,
    pub client_report_id: String,
    /// Member the report belongs to. On the anonymous path this is plain
    /// data the server uses for attribution, not an authenticated claim.
    pub intended_member_id: Option<String>,
    pub device_identity_id: Option<String>,
    pub dmf_status: ReportStatus,
    pub dmf_confirmation_number: Option<String>,
    pub dmf_object_id: Option<i64>,
    pub dmf_submitted_at: Option<DateTime<Utc>>,
    pub harvest: HarvestInput,
    pub reported_at: DateTime<Utc>,
}

impl CanonicalReportPayload {
    pub fn from_report(report: &Report, device_identity_id: Option<&str>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            client_report_id: report.id.clone(),
            intended_member_id: report.member_id.clone(),
            device_identity_id: report
                .device_identity_id
                .clone()
                .or_else(|| device_identity_id.map(str::to_string)),
            dmf_status: report.dmf_status,
            dmf_confirmation_number: report.dmf_confirmation_number.clone(),
            dmf_object_id: report.dmf_object_id,
            dmf_submitted_at: report.dmf_submitted_at,
            harvest: report.harvest.clone(),
            reported_at: report.created_at,
        }
    }
}

/// Government acceptance written onto a backend row that was created while
/// the submission was still queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernmentStatusUpdate {
    pub dmf_status: ReportStatus,
    pub dmf_confirmation_number: String,
    pub dmf_object_id: Option<i64>,
    pub dmf_submitted_at: Option<DateTime<Utc>>,
}

impl GovernmentStatusUpdate {
    /// `None` until the endpoint has issued a confirmation number.
    pub fn accepted(report: &Report) -> Option<Self> {
        Some(Self {
            dmf_status: ReportStatus::Submitted,
            dmf_confirmation_number: report.dmf_confirmation_number.clone()?,
            dmf_object_id: report.dmf_object_id,
            dmf_submitted_at: report.dmf_submitted_at,
        })
    }
}

/// Result of either create procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub report_id: String,
    pub status: ReportStatus,
    #[serde(default)]
    pub owner_anonymous_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Projection of a backend report row used for dedup and delivery retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReport {
    pub id: String,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub owner_anonymous_id: Option<String>,
    pub harvest_date: NaiveDate,
    pub area_code: String,
    #[serde(default)]
    pub area_label: Option<String>,
    #[serde(default)]
    pub species_counts: SpeciesCounts,
    #[serde(default)]
    pub angler: AnglerContact,
    #[serde(default)]
    pub dmf_status: ReportStatus,
    #[serde(default)]
    pub dmf_confirmation_number: Option<String>,
    #[serde(default)]
    pub dmf_object_id: Option<i64>,
    #[serde(default)]
    pub webhook_status: Option<WebhookStatus>,
    #[serde(default)]
    pub webhook_error: Option<String>,
    #[serde(default)]
    pub webhook_attempts: u32,
    pub created_at: DateTime<Utc>,
}

/// Natural key used when a report has no government object id yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerDayAreaKey {
    pub owner_id: String,
    pub harvest_date: NaiveDate,
    pub area_code: String,
}

impl OwnerDayAreaKey {
    pub fn for_report(report: &Report) -> Option<Self> {
        Some(Self {
            owner_id: report.owner_id()?.to_string(),
            harvest_date: report.harvest.harvest_date,
            area_code: report.harvest.area_code.clone(),
        })
    }
}
