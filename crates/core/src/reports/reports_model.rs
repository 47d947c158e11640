//! Canonical harvest report schema and its lifecycle rules.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Version written into every report the engine persists.
pub const REPORT_SCHEMA_VERSION: u32 = 2;

fn legacy_schema_version() -> u32 {
    1
}

/// Regulated species tracked by the harvest report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    RedDrum,
    SouthernFlounder,
    SpottedSeatrout,
    Weakfish,
    StripedBass,
}

impl Species {
    pub const ALL: [Species; 5] = [
        Species::RedDrum,
        Species::SouthernFlounder,
        Species::SpottedSeatrout,
        Species::Weakfish,
        Species::StripedBass,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Species::RedDrum => "Red Drum",
            Species::SouthernFlounder => "Southern Flounder",
            Species::SpottedSeatrout => "Spotted Seatrout",
            Species::Weakfish => "Weakfish",
            Species::StripedBass => "Striped Bass",
        }
    }
}

/// Aggregate harvest count per species.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeciesCounts {
    pub red_drum: u32,
    pub southern_flounder: u32,
    pub spotted_seatrout: u32,
    pub weakfish: u32,
    pub striped_bass: u32,
}

impl SpeciesCounts {
    pub fn get(&self, species: Species) -> u32 {
        match species {
            Species::RedDrum => self.red_drum,
            Species::SouthernFlounder => self.southern_flounder,
            Species::SpottedSeatrout => self.spotted_seatrout,
            Species::Weakfish => self.weakfish,
            Species::StripedBass => self.striped_bass,
        }
    }

    pub fn add(&mut self, species: Species, count: u32) {
        let slot = match species {
            Species::RedDrum => &mut self.red_drum,
            Species::SouthernFlounder => &mut self.southern_flounder,
            Species::SpottedSeatrout => &mut self.spotted_seatrout,
            Species::Weakfish => &mut self.weakfish,
            Species::StripedBass => &mut self.striped_bass,
        };
        *slot = slot.saturating_add(count);
    }

    pub fn total(&self) -> u32 {
        Species::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Species with a non-zero count, in canonical order.
    pub fn non_zero(&self) -> impl Iterator<Item = (Species, u32)> + '_ {
        Species::ALL
            .into_iter()
            .map(|s| (s, self.get(s)))
            .filter(|(_, count)| *count > 0)
    }

    pub fn from_entries(entries: &[FishEntry]) -> Self {
        let mut counts = Self::default();
        for entry in entries {
            counts.add(entry.species, entry.count);
        }
        counts
    }
}

/// One line of individual fish detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishEntry {
    pub species: Species,
    pub count: u32,
    /// Per-fish lengths in inches, when measured.
    #[serde(default)]
    pub lengths: Vec<f32>,
    #[serde(default)]
    pub tag_number: Option<String>,
}

impl FishEntry {
    pub fn new(species: Species, count: u32) -> Self {
        Self {
            species,
            count,
            lengths: Vec::new(),
            tag_number: None,
        }
    }
}

/// Who the harvest is being reported for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ReportingScope {
    #[default]
    Individual,
    #[serde(rename_all = "camelCase")]
    Family { member_count: u32 },
}

/// Contact details and confirmation consent of the reporting angler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnglerContact {
    pub first_name: String,
    pub last_name: String,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub wants_text_confirmation: bool,
    pub wants_email_confirmation: bool,
}

/// What the angler entered. Also the government-direct queue payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestInput {
    pub harvest_date: NaiveDate,
    pub area_code: String,
    #[serde(default)]
    pub area_label: Option<String>,
    #[serde(default)]
    pub species_counts: SpeciesCounts,
    #[serde(default)]
    pub fish_entries: Vec<FishEntry>,
    #[serde(default)]
    pub used_hook_and_line: bool,
    #[serde(default)]
    pub gear_code: Option<String>,
    #[serde(default)]
    pub reporting_for: ReportingScope,
    #[serde(default)]
    pub angler: AnglerContact,
    #[serde(default)]
    pub photo_uri: Option<String>,
}

impl HarvestInput {
    pub fn validate(&self) -> Result<()> {
        if self.area_code.trim().is_empty() {
            return Err(Error::validation("Harvest area code is required"));
        }
        if !self.fish_entries.is_empty()
            && SpeciesCounts::from_entries(&self.fish_entries) != self.species_counts
        {
            return Err(Error::validation(
                "Species counts do not match the individual fish entries",
            ));
        }
        if let ReportingScope::Family { member_count: 0 } = self.reporting_for {
            return Err(Error::validation("Family reports need at least one member"));
        }
        Ok(())
    }
}

/// Government reporting lifecycle of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Submitted => "submitted",
            ReportStatus::Confirmed => "confirmed",
            ReportStatus::Failed => "failed",
        }
    }

    /// `confirmed` and `failed` end the automated pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Confirmed | ReportStatus::Failed)
    }

    /// Whether the state machine allows moving to `next`. Re-applying the
    /// current status is always allowed.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        *self == next
            || matches!(
                (*self, next),
                (Pending, Submitted) | (Pending, Failed) | (Submitted, Confirmed) | (Submitted, Failed)
            )
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the delivery-confirmation webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Sent,
    Failed,
}

/// A harvest event tracked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    /// Id the report had on the device before the backend assigned one.
    #[serde(default)]
    pub local_id: Option<String>,
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub device_identity_id: Option<String>,
    #[serde(default)]
    pub dmf_status: ReportStatus,
    #[serde(default)]
    pub dmf_confirmation_number: Option<String>,
    #[serde(default)]
    pub dmf_object_id: Option<i64>,
    #[serde(default)]
    pub dmf_error: Option<String>,
    #[serde(default)]
    pub dmf_submitted_at: Option<DateTime<Utc>>,
    pub harvest: HarvestInput,
    #[serde(default)]
    pub webhook_status: Option<WebhookStatus>,
    #[serde(default)]
    pub webhook_error: Option<String>,
    #[serde(default)]
    pub webhook_attempts: u32,
    /// Set once the application backend holds this report.
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// A fresh `pending` report owned by exactly one identity.
    pub fn new_pending(
        id: impl Into<String>,
        member_id: Option<String>,
        device_identity_id: Option<String>,
        harvest: HarvestInput,
    ) -> Self {
        let now = Utc::now();
        // Member ownership wins: only one identity is authoritative at creation.
        let device_identity_id = if member_id.is_some() {
            None
        } else {
            device_identity_id
        };
        Self {
            id: id.into(),
            local_id: None,
            schema_version: REPORT_SCHEMA_VERSION,
            member_id,
            device_identity_id,
            dmf_status: ReportStatus::Pending,
            dmf_confirmation_number: None,
            dmf_object_id: None,
            dmf_error: None,
            dmf_submitted_at: None,
            harvest,
            webhook_status: None,
            webhook_error: None,
            webhook_attempts: 0,
            synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The authoritative owner: the member when linked, else the device identity.
    pub fn owner_id(&self) -> Option<&str> {
        self.member_id
            .as_deref()
            .or(self.device_identity_id.as_deref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("Report id is required"));
        }
        if self.owner_id().is_none() {
            return Err(Error::validation(format!(
                "Report {} has neither a member nor a device identity owner",
                self.id
            )));
        }
        self.harvest.validate()
    }

    /// Older records only carry aggregate counts. Synthesize one entry per
    /// species with a non-zero count; returns whether anything was added.
    pub fn ensure_fish_entries(&mut self) -> bool {
        if !self.harvest.fish_entries.is_empty() {
            return false;
        }
        let entries = self
            .harvest
            .species_counts
            .non_zero()
            .map(|(species, count)| FishEntry::new(species, count))
            .collect::<Vec<_>>();
        let changed = !entries.is_empty();
        self.harvest.fish_entries = entries;
        changed
    }

    /// Fill bookkeeping introduced after the first schema version.
    pub(crate) fn normalize(mut self) -> Self {
        if self.schema_version < REPORT_SCHEMA_VERSION {
            self.schema_version = REPORT_SCHEMA_VERSION;
        }
        self
    }

    pub fn status_update(&self) -> StatusUpdate {
        StatusUpdate {
            dmf_status: self.dmf_status,
            dmf_confirmation_number: self.dmf_confirmation_number.clone(),
            dmf_object_id: self.dmf_object_id,
            dmf_error: self.dmf_error.clone(),
            dmf_submitted_at: self.dmf_submitted_at,
        }
    }

    fn apply_status(&mut self, update: StatusUpdate) {
        self.dmf_status = update.dmf_status;
        self.dmf_confirmation_number = update.dmf_confirmation_number;
        self.dmf_object_id = update.dmf_object_id;
        self.dmf_error = update.dmf_error;
        self.dmf_submitted_at = update.dmf_submitted_at;
    }
}

/// Full replacement of the status-bearing fields.
///
/// Applying a `StatusUpdate` overwrites every field below. Fields left as
/// `None` are cleared on the report, so a caller moving a submitted report to
/// `failed` must pass the confirmation number again to keep it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub dmf_status: ReportStatus,
    pub dmf_confirmation_number: Option<String>,
    pub dmf_object_id: Option<i64>,
    pub dmf_error: Option<String>,
    pub dmf_submitted_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn submitted(confirmation_number: impl Into<String>, object_id: Option<i64>) -> Self {
        Self {
            dmf_status: ReportStatus::Submitted,
            dmf_confirmation_number: Some(confirmation_number.into()),
            dmf_object_id: object_id,
            dmf_error: None,
            dmf_submitted_at: Some(Utc::now()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            dmf_status: ReportStatus::Failed,
            dmf_error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Move to `confirmed` carrying over the submitted fields.
    pub fn confirmed_from(report: &Report) -> Self {
        Self {
            dmf_status: ReportStatus::Confirmed,
            dmf_error: None,
            ..report.status_update()
        }
    }

    pub fn validate_from(&self, current: ReportStatus) -> Result<()> {
        if !current.can_transition_to(self.dmf_status) {
            return Err(Error::InvalidTransition {
                from: current,
                to: self.dmf_status,
            });
        }
        let needs_confirmation = matches!(
            self.dmf_status,
            ReportStatus::Submitted | ReportStatus::Confirmed
        );
        if needs_confirmation
            && self
                .dmf_confirmation_number
                .as_deref()
                .map_or(true, |n| n.trim().is_empty())
        {
            return Err(Error::validation(format!(
                "Status {} requires a government confirmation number",
                self.dmf_status
            )));
        }
        Ok(())
    }
}

/// Delivery-confirmation bookkeeping written after every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookUpdate {
    pub webhook_status: WebhookStatus,
    pub webhook_error: Option<String>,
    pub webhook_attempts: u32,
}

/// Partial update accepted by the local repository.
///
/// Identity fields are deliberately absent: they change only through remote
/// id adoption and identity linking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportUpdate {
    pub status: Option<StatusUpdate>,
    pub fish_entries: Option<Vec<FishEntry>>,
    pub photo_uri: Option<Option<String>>,
    pub webhook: Option<WebhookUpdate>,
}

impl ReportUpdate {
    pub fn status(status: StatusUpdate) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn webhook(update: WebhookUpdate) -> Self {
        Self {
            webhook: Some(update),
            ..Default::default()
        }
    }

    pub(crate) fn apply_to(self, report: &mut Report) -> Result<()> {
        if let Some(status) = self.status {
            status.validate_from(report.dmf_status)?;
            report.apply_status(status);
        }
        if let Some(entries) = self.fish_entries {
            let counts = SpeciesCounts::from_entries(&entries);
            if !entries.is_empty() && counts != report.harvest.species_counts {
                return Err(Error::validation(format!(
                    "Fish entries for report {} do not add up to its species counts",
                    report.id
                )));
            }
            report.harvest.fish_entries = entries;
        }
        if let Some(photo_uri) = self.photo_uri {
            report.harvest.photo_uri = photo_uri;
        }
        if let Some(webhook) = self.webhook {
            report.webhook_status = Some(webhook.webhook_status);
            report.webhook_error = webhook.webhook_error;
            report.webhook_attempts = webhook.webhook_attempts;
        }
        report.updated_at = Utc::now();
        Ok(())
    }
}
