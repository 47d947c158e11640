use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::remote::ReportBackend;
use crate::reports::LocalReportRepository;
use crate::storage::{load_json, read_json, write_json, KeyValueStore, StorageKey};

use super::{DeviceIdentity, IdentitySource, LinkOutcome, MemberIdentity, ResolvedIdentity};

/// Decides which remote owner a report belongs to.
pub struct IdentityResolver {
    store: Arc<dyn KeyValueStore>,
    repository: Arc<LocalReportRepository>,
    backend: Arc<dyn ReportBackend>,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        repository: Arc<LocalReportRepository>,
        backend: Arc<dyn ReportBackend>,
    ) -> Self {
        Self {
            store,
            repository,
            backend,
        }
    }

    /// Load the device identity, creating and persisting it on first use.
    pub fn ensure_device_identity(&self) -> Result<DeviceIdentity> {
        if let Some(identity) =
            load_json::<DeviceIdentity>(self.store.as_ref(), StorageKey::DeviceIdentity)?
        {
            return Ok(identity);
        }

        let identity = DeviceIdentity {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };
        write_json(self.store.as_ref(), StorageKey::DeviceIdentity, &identity)?;
        info!("[Identity] Created device identity {}", identity.id);
        Ok(identity)
    }

    pub fn cached_member(&self) -> Option<MemberIdentity> {
        read_json(self.store.as_ref(), StorageKey::CachedMember)
    }

    /// Resolve the acting identity.
    ///
    /// A plausible cached member wins even without a live session. Otherwise
    /// the backend is asked for a member linked to this device; any failure
    /// there degrades to the device identity alone.
    pub async fn resolve_identity(&self) -> Result<ResolvedIdentity> {
        let device = self.ensure_device_identity()?;

        if let Some(member) = self.cached_member().filter(MemberIdentity::is_plausible) {
            debug!("[Identity] Using cached member {}", member.member_id);
            return Ok(ResolvedIdentity {
                device_identity_id: device.id,
                member_identity_id: Some(member.member_id),
                source: IdentitySource::CachedMember,
            });
        }

        match self.backend.find_member_for_device(&device.id).await {
            Ok(Some(member)) if member.is_plausible() => {
                if let Err(err) = write_json(self.store.as_ref(), StorageKey::CachedMember, &member)
                {
                    warn!("[Identity] Failed to cache member {}: {}", member.member_id, err);
                }
                return Ok(ResolvedIdentity {
                    device_identity_id: device.id,
                    member_identity_id: Some(member.member_id),
                    source: IdentitySource::RemoteMember,
                });
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    "[Identity] Member lookup for device {} failed, continuing anonymously: {}",
                    device.id, err
                );
            }
        }

        Ok(ResolvedIdentity {
            device_identity_id: device.id,
            member_identity_id: None,
            source: IdentitySource::DeviceOnly,
        })
    }

    /// Hand the device's unlinked reports to a member, locally and remotely.
    ///
    /// Only reports with no member owner are claimed, so a retry after a
    /// partial failure is harmless.
    pub async fn link_reports_to_identity(
        &self,
        device_identity_id: &str,
        member_id: &str,
    ) -> Result<LinkOutcome> {
        let local_claimed = self
            .repository
            .claim_for_member(device_identity_id, member_id)?;

        let remote_claimed = self
            .backend
            .link_device_reports(device_identity_id, member_id)
            .await
            .map_err(|err| {
                warn!(
                    "[Identity] Remote link of device {} to member {} failed: {}",
                    device_identity_id, member_id, err
                );
                Error::from(err)
            })?;

        info!(
            "[Identity] Linked device {} to member {} (local={}, remote={})",
            device_identity_id, member_id, local_claimed, remote_claimed
        );
        Ok(LinkOutcome {
            remote_claimed,
            local_claimed,
        })
    }

    /// Cache a freshly opted-in member and merge the device history into it.
    pub async fn register_member(&self, mut member: MemberIdentity) -> Result<LinkOutcome> {
        if !member.is_plausible() {
            return Err(Error::validation(format!(
                "Member {} has not completed opt-in",
                member.member_id
            )));
        }
        let device = self.ensure_device_identity()?;
        member.device_identity_id.get_or_insert_with(|| device.id.clone());
        write_json(self.store.as_ref(), StorageKey::CachedMember, &member)?;

        self.link_reports_to_identity(&device.id, &member.member_id)
            .await
    }

    /// Drop the cached member (logout). The device identity stays.
    pub fn forget_member(&self) -> Result<()> {
        self.store.remove(StorageKey::CachedMember)
    }
}
