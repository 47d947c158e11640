use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::reports::HarvestInput;

/// Prefix of confirmation numbers minted on the device.
pub const LOCAL_CONFIRMATION_PREFIX: &str = "LOCAL";

/// Answer of the government endpoint to one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SubmissionOutcome {
    #[serde(rename_all = "camelCase")]
    Accepted {
        confirmation_number: String,
        object_id: Option<i64>,
    },
    /// The endpoint refused the input; retrying it unchanged will not help.
    Rejected { error: String },
    /// The endpoint could not be reached; the input should be retried.
    Queued { error: String },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Accepted { .. } => None,
            SubmissionOutcome::Rejected { error } | SubmissionOutcome::Queued { error } => {
                Some(error)
            }
        }
    }
}

/// A government submission waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSubmissionEntry {
    pub id: String,
    pub input: HarvestInput,
    /// Local report this submission belongs to, if any.
    #[serde(default)]
    pub report_id: Option<String>,
    pub queued_at: DateTime<Utc>,
    /// Shown to the user while the submission is unsent.
    pub local_confirmation_number: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// A government-confirmed submission kept for local display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionHistoryEntry {
    pub confirmation_number: String,
    #[serde(default)]
    pub local_confirmation_number: Option<String>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub report_id: Option<String>,
    pub input: HarvestInput,
    pub submitted_at: DateTime<Utc>,
}

/// Result of one pass over the offline queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainSummary {
    pub synced: usize,
    /// Still queued; will be retried on the next drain.
    pub failed: usize,
    /// Dropped after exhausting the retry budget. Never reconciled.
    pub expired: usize,
    pub expired_entries: Vec<OfflineSubmissionEntry>,
    /// Local reports that left `pending` because the endpoint accepted them.
    pub accepted_report_ids: Vec<String>,
}

/// Mint a confirmation number the user can quote before the endpoint has
/// seen the submission, e.g. `LOCAL-20260504-7F3A9C`.
pub fn generate_local_confirmation_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
    format!(
        "{}-{}-{:06X}",
        LOCAL_CONFIRMATION_PREFIX,
        now.format("%Y%m%d"),
        suffix
    )
}
