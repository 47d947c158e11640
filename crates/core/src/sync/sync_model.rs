//! Retry classification and cycle bookkeeping shared by the sync paths.

use serde::{Deserialize, Serialize};

/// Retry policy classification for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 423 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

/// Trigger source for sync cycles. The engine never schedules itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCycleTrigger {
    Startup,
    Foreground,
    ConnectivityRestored,
    Manual,
}

/// Step of a per-report sync at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Dedup,
    Create,
    Reconcile,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStage::Dedup => "dedup",
            SyncStage::Create => "create",
            SyncStage::Reconcile => "reconcile",
        };
        f.write_str(name)
    }
}

/// How one pending report left (or did not leave) the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncItemOutcome {
    /// Created on the backend under `remote_id`.
    Created { remote_id: String },
    /// Already present remotely; adopted `remote_id` without creating.
    Deduplicated { remote_id: String },
    /// The local record already carried a remote id; only the index entry was stale.
    AlreadySynced { remote_id: String },
    /// The index pointed at a report that no longer exists locally.
    Pruned,
}

/// Counters for one `sync_pending` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCycleResult {
    pub synced: usize,
    pub failed: usize,
    pub pruned: usize,
    /// Connectivity never came up; nothing was attempted.
    pub offline: bool,
    /// Backend ids of the reports that ended the run synced.
    #[serde(default)]
    pub synced_ids: Vec<String>,
}
