//! Wire types for the backend, government and delivery endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use catchlog_core::identity::MemberIdentity;
use catchlog_core::remote::{CanonicalReportPayload, GovernmentStatusUpdate, RemoteReport};
use catchlog_core::reports::{
    AnglerContact, HarvestInput, ReportStatus, ReportingScope, SpeciesCounts, WebhookStatus,
    WebhookUpdate,
};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// PostgREST error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ApiErrorResponse {
    pub fn summary(&self) -> String {
        let mut summary = match &self.code {
            Some(code) => format!("{}: {}", code, self.message),
            None => self.message.clone(),
        };
        if let Some(details) = &self.details {
            summary.push_str(&format!(" ({})", details));
        }
        summary
    }
}

/// Auth endpoint error body.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

// ─────────────────────────────────────────────────────────────────────────────
// Report procedures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateReportRequest<'a> {
    pub p_report: &'a CanonicalReportPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAnonymousReportRequest<'a> {
    pub p_device_identity_id: &'a str,
    pub p_report: &'a CanonicalReportPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkDeviceReportsRequest<'a> {
    pub p_device_identity_id: &'a str,
    pub p_member_id: &'a str,
}

/// Row of the `harvest_reports` table, as much of it as the engine reads.
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestReportRow {
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
    pub red_drum: u32,
    #[serde(default)]
    pub southern_flounder: u32,
    #[serde(default)]
    pub spotted_seatrout: u32,
    #[serde(default)]
    pub weakfish: u32,
    #[serde(default)]
    pub striped_bass: u32,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub wants_text_confirmation: bool,
    #[serde(default)]
    pub wants_email_confirmation: bool,
    #[serde(default)]
    pub dmf_status: Option<ReportStatus>,
    #[serde(default)]
    pub dmf_confirmation_number: Option<String>,
    #[serde(default)]
    pub dmf_object_id: Option<i64>,
    #[serde(default)]
    pub webhook_status: Option<WebhookStatus>,
    #[serde(default)]
    pub webhook_error: Option<String>,
    #[serde(default)]
    pub webhook_attempts: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl From<HarvestReportRow> for RemoteReport {
    fn from(row: HarvestReportRow) -> Self {
        RemoteReport {
            id: row.id,
            member_id: row.member_id,
            owner_anonymous_id: row.owner_anonymous_id,
            harvest_date: row.harvest_date,
            area_code: row.area_code,
            area_label: row.area_label,
            species_counts: SpeciesCounts {
                red_drum: row.red_drum,
                southern_flounder: row.southern_flounder,
                spotted_seatrout: row.spotted_seatrout,
                weakfish: row.weakfish,
                striped_bass: row.striped_bass,
            },
            angler: AnglerContact {
                first_name: row.first_name.unwrap_or_default(),
                last_name: row.last_name.unwrap_or_default(),
                zip_code: row.zip_code,
                phone: row.phone,
                email: row.email,
                wants_text_confirmation: row.wants_text_confirmation,
                wants_email_confirmation: row.wants_email_confirmation,
            },
            dmf_status: row.dmf_status.unwrap_or_default(),
            dmf_confirmation_number: row.dmf_confirmation_number,
            dmf_object_id: row.dmf_object_id,
            webhook_status: row.webhook_status,
            webhook_error: row.webhook_error,
            webhook_attempts: row.webhook_attempts.unwrap_or(0),
            created_at: row.created_at,
        }
    }
}

/// PATCH body for the delivery bookkeeping columns.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryStatusPatch<'a> {
    pub webhook_status: WebhookStatus,
    pub webhook_error: Option<&'a str>,
    pub webhook_attempts: u32,
}

impl<'a> From<&'a WebhookUpdate> for DeliveryStatusPatch<'a> {
    fn from(update: &'a WebhookUpdate) -> Self {
        Self {
            webhook_status: update.webhook_status,
            webhook_error: update.webhook_error.as_deref(),
            webhook_attempts: update.webhook_attempts,
        }
    }
}

/// PATCH body for the government columns.
#[derive(Debug, Clone, Serialize)]
pub struct GovernmentStatusPatch<'a> {
    pub dmf_status: ReportStatus,
    pub dmf_confirmation_number: &'a str,
    pub dmf_object_id: Option<i64>,
    pub dmf_submitted_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a GovernmentStatusUpdate> for GovernmentStatusPatch<'a> {
    fn from(update: &'a GovernmentStatusUpdate) -> Self {
        Self {
            dmf_status: update.dmf_status,
            dmf_confirmation_number: &update.dmf_confirmation_number,
            dmf_object_id: update.dmf_object_id,
            dmf_submitted_at: update.dmf_submitted_at,
        }
    }
}

/// Row of the `members` table.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRow {
    pub id: String,
    #[serde(default)]
    pub device_identity_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub has_completed_opt_in: bool,
    #[serde(default)]
    pub opted_in_at: Option<DateTime<Utc>>,
}

impl From<MemberRow> for MemberIdentity {
    fn from(row: MemberRow) -> Self {
        MemberIdentity {
            member_id: row.id,
            device_identity_id: row.device_identity_id,
            email: row.email,
            display_name: row.display_name,
            has_completed_opt_in: row.has_completed_opt_in,
            opted_in_at: row.opted_in_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Government endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Field layout of the government harvest submission form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernmentSubmissionRequest {
    /// `MM/DD/YYYY`, as the form expects.
    pub harvest_date: String,
    pub area_code: String,
    pub red_drum: u32,
    pub southern_flounder: u32,
    pub spotted_seatrout: u32,
    pub weakfish: u32,
    pub striped_bass: u32,
    pub hook_and_line: bool,
    pub gear_code: Option<String>,
    pub family_members: u32,
    pub first_name: String,
    pub last_name: String,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub wants_text_confirmation: bool,
    pub wants_email_confirmation: bool,
}

impl From<&HarvestInput> for GovernmentSubmissionRequest {
    fn from(input: &HarvestInput) -> Self {
        let counts = input.species_counts;
        let family_members = match input.reporting_for {
            ReportingScope::Individual => 1,
            ReportingScope::Family { member_count } => member_count,
        };
        Self {
            harvest_date: input.harvest_date.format("%m/%d/%Y").to_string(),
            area_code: input.area_code.clone(),
            red_drum: counts.red_drum,
            southern_flounder: counts.southern_flounder,
            spotted_seatrout: counts.spotted_seatrout,
            weakfish: counts.weakfish,
            striped_bass: counts.striped_bass,
            hook_and_line: input.used_hook_and_line,
            gear_code: input.gear_code.clone(),
            family_members,
            first_name: input.angler.first_name.clone(),
            last_name: input.angler.last_name.clone(),
            zip_code: input.angler.zip_code.clone(),
            phone: input.angler.phone.clone(),
            email: input.angler.email.clone(),
            wants_text_confirmation: input.angler.wants_text_confirmation,
            wants_email_confirmation: input.angler.wants_email_confirmation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernmentSubmissionResponse {
    #[serde(default)]
    pub confirmation_number: Option<String>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}
