use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::remote::RemoteReport;
use crate::reports::{AnglerContact, Report, SpeciesCounts};

/// Minimal attribute set the confirmation service needs. Rebuilt from stored
/// fields, so a retry never depends on the original in-memory form state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPayload {
    /// Backend report id.
    pub global_id: String,
    pub confirmation_number: Option<String>,
    pub object_id: Option<i64>,
    pub harvest_date: NaiveDate,
    pub area_code: String,
    pub area_label: Option<String>,
    pub species_counts: SpeciesCounts,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub wants_text_confirmation: bool,
    pub wants_email_confirmation: bool,
}

impl DeliveryPayload {
    #[allow(clippy::too_many_arguments)]
    fn build(
        global_id: &str,
        confirmation_number: Option<&str>,
        object_id: Option<i64>,
        harvest_date: NaiveDate,
        area_code: &str,
        area_label: Option<&str>,
        species_counts: &SpeciesCounts,
        angler: &AnglerContact,
    ) -> Self {
        Self {
            global_id: global_id.to_string(),
            confirmation_number: confirmation_number.map(str::to_string),
            object_id,
            harvest_date,
            area_code: area_code.to_string(),
            area_label: area_label.map(str::to_string),
            species_counts: *species_counts,
            first_name: angler.first_name.clone(),
            last_name: angler.last_name.clone(),
            phone: angler.phone.clone(),
            email: angler.email.clone(),
            wants_text_confirmation: angler.wants_text_confirmation,
            wants_email_confirmation: angler.wants_email_confirmation,
        }
    }

    pub fn from_remote(report: &RemoteReport) -> Self {
        Self::build(
            &report.id,
            report.dmf_confirmation_number.as_deref(),
            report.dmf_object_id,
            report.harvest_date,
            &report.area_code,
            report.area_label.as_deref(),
            &report.species_counts,
            &report.angler,
        )
    }

    pub fn from_report(report: &Report) -> Self {
        Self::build(
            &report.id,
            report.dmf_confirmation_number.as_deref(),
            report.dmf_object_id,
            report.harvest.harvest_date,
            &report.harvest.area_code,
            report.harvest.area_label.as_deref(),
            &report.harvest.species_counts,
            &report.harvest.angler,
        )
    }

    /// Nothing to send when the angler asked for no confirmation at all.
    pub fn wants_confirmation(&self) -> bool {
        (self.wants_text_confirmation && self.phone.is_some())
            || (self.wants_email_confirmation && self.email.is_some())
    }
}

/// Answer of the delivery service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl DeliveryResult {
    pub fn delivered() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
        }
    }

    /// Errors joined for storage in `webhook_error`.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRetrySummary {
    pub retried: usize,
    pub succeeded: usize,
    /// Candidates passed over because the government object id is unknown.
    pub skipped: usize,
}
