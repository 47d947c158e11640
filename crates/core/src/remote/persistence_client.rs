use std::sync::Arc;

use log::{debug, warn};

use crate::errors::{RemoteError, RemoteResult, Result};
use crate::identity::IdentityResolver;
use crate::reports::{LocalReportRepository, Report};

use super::{CanonicalReportPayload, ReportBackend, StoredReport};

/// Creates reports on the application backend.
///
/// Member-owned reports go through the authenticated procedure when the
/// session is valid. A stale or rejected session falls back to the anonymous
/// procedure with the member id carried as data, so the report keeps its
/// owner even when the session refresh lost a race with app backgrounding.
pub struct RemotePersistenceClient {
    backend: Arc<dyn ReportBackend>,
    repository: Arc<LocalReportRepository>,
    identity: Arc<IdentityResolver>,
}

impl RemotePersistenceClient {
    pub fn new(
        backend: Arc<dyn ReportBackend>,
        repository: Arc<LocalReportRepository>,
        identity: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            backend,
            repository,
            identity,
        }
    }

    /// Create `report` remotely and mirror the stored result locally.
    ///
    /// Errors other than authorization are returned as-is; retrying is the
    /// orchestrator's job.
    pub async fn create(&self, report: &Report) -> Result<StoredReport> {
        let device_identity_id = match report.device_identity_id.clone() {
            Some(id) => id,
            None => self.identity.ensure_device_identity()?.id,
        };
        let payload = CanonicalReportPayload::from_report(report, Some(&device_identity_id));

        let stored = self
            .create_remote(report, &device_identity_id, &payload)
            .await?;

        self.repository.save_synced(
            report.clone(),
            &stored.report_id,
            stored.owner_anonymous_id.as_deref(),
        )?;
        Ok(stored)
    }

    async fn create_remote(
        &self,
        report: &Report,
        device_identity_id: &str,
        payload: &CanonicalReportPayload,
    ) -> RemoteResult<StoredReport> {
        if let Some(member_id) = report.member_id.as_deref() {
            match self.backend.refresh_session().await {
                Ok(Some(session)) if session.member_id == member_id => {
                    match self.backend.create_report(&session, payload).await {
                        Ok(stored) => return Ok(stored),
                        Err(RemoteError::Auth(message)) => {
                            warn!(
                                "[ReportSync] Authenticated create rejected for report {} ({}); using anonymous procedure",
                                report.id, message
                            );
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok(Some(session)) => {
                    warn!(
                        "[ReportSync] Session belongs to member {} but report {} belongs to {}; using anonymous procedure",
                        session.member_id, report.id, member_id
                    );
                }
                Ok(None) => {
                    debug!(
                        "[ReportSync] No valid session for member {}; using anonymous procedure for report {}",
                        member_id, report.id
                    );
                }
                Err(RemoteError::Auth(message)) => {
                    warn!(
                        "[ReportSync] Session refresh rejected for report {} ({}); using anonymous procedure",
                        report.id, message
                    );
                }
                Err(err) => return Err(err),
            }
        }

        self.backend
            .create_report_anonymous(device_identity_id, payload)
            .await
    }
}
