use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anonymous identity scoped to this device. Always exists once the engine
/// has been used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Rewards-program member snapshot, cached locally after opt-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberIdentity {
    pub member_id: String,
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

impl MemberIdentity {
    /// A cached member is trusted without a live session only when it looks
    /// like a finished opt-in.
    pub fn is_plausible(&self) -> bool {
        self.has_completed_opt_in && !self.member_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    CachedMember,
    RemoteMember,
    DeviceOnly,
}

/// Who is acting on this device right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentity {
    pub device_identity_id: String,
    pub member_identity_id: Option<String>,
    pub source: IdentitySource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOutcome {
    pub remote_claimed: usize,
    pub local_claimed: usize,
}
