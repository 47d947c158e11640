use async_trait::async_trait;

use crate::errors::RemoteResult;
use crate::identity::MemberIdentity;
use crate::reports::WebhookUpdate;

use super::{
    CanonicalReportPayload, GovernmentStatusUpdate, OwnerDayAreaKey, RemoteReport, Session,
    StoredReport,
};

/// Port to the application backend.
///
/// Every method reports failure as a tagged [`crate::errors::RemoteError`];
/// implementations never retry on their own.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Refresh the member session. `Ok(None)` means there is no usable session.
    async fn refresh_session(&self) -> RemoteResult<Option<Session>>;

    /// Atomic create scoped to the authenticated member.
    async fn create_report(
        &self,
        session: &Session,
        payload: &CanonicalReportPayload,
    ) -> RemoteResult<StoredReport>;

    /// Atomic create keyed by the device identity.
    async fn create_report_anonymous(
        &self,
        device_identity_id: &str,
        payload: &CanonicalReportPayload,
    ) -> RemoteResult<StoredReport>;

    async fn find_report_by_object_id(&self, object_id: i64) -> RemoteResult<Option<RemoteReport>>;

    async fn find_report_by_owner_day_area(
        &self,
        key: &OwnerDayAreaKey,
    ) -> RemoteResult<Option<RemoteReport>>;

    /// Reports whose delivery confirmation failed fewer than `max_attempts` times.
    async fn list_failed_deliveries(&self, max_attempts: u32) -> RemoteResult<Vec<RemoteReport>>;

    async fn update_delivery_status(
        &self,
        report_id: &str,
        update: &WebhookUpdate,
    ) -> RemoteResult<()>;

    /// Record the government confirmation on an existing row.
    async fn update_government_status(
        &self,
        report_id: &str,
        update: &GovernmentStatusUpdate,
    ) -> RemoteResult<()>;

    async fn find_member_for_device(
        &self,
        device_identity_id: &str,
    ) -> RemoteResult<Option<MemberIdentity>>;

    /// Claim unlinked device reports for a member. Returns how many were claimed.
    async fn link_device_reports(
        &self,
        device_identity_id: &str,
        member_id: &str,
    ) -> RemoteResult<usize>;
}
