//! Application backend client (PostgREST-style REST + token auth).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::header::HeaderMap;

use catchlog_core::identity::MemberIdentity;
use catchlog_core::remote::{
    CanonicalReportPayload, GovernmentStatusUpdate, OwnerDayAreaKey, RemoteReport, ReportBackend,
    Session, StoredReport,
};
use catchlog_core::reports::WebhookUpdate;
use catchlog_core::secrets::{SecretStore, SESSION_ACCESS_TOKEN_KEY, SESSION_REFRESH_TOKEN_KEY};
use catchlog_core::{RemoteError, RemoteResult};

use crate::error::{ReportSyncError, Result};
use crate::http::{build_client, json_headers, parse_empty_response, parse_response, DEFAULT_TIMEOUT_SECS};
use crate::types::*;

const REPORTS_TABLE: &str = "harvest_reports";

/// Client for the report backend.
///
/// Session tokens live in the platform [`SecretStore`]; the anonymous
/// procedures and lookups run with the public API key when no member session
/// is stored.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    secrets: Arc<dyn SecretStore>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// * `base_url` - backend root, e.g. "https://catchlog.example.supabase.co"
    /// * `api_key` - public (anon) key sent as `apikey` on every request
    pub fn new(base_url: &str, api_key: &str, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ReportSyncError::config("Backend API key is empty"));
        }
        Ok(Self {
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            secrets,
        })
    }

    fn headers(&self, bearer: &str) -> Result<HeaderMap> {
        let mut headers = json_headers(Some(bearer))?;
        let api_key = reqwest::header::HeaderValue::from_str(&self.api_key)
            .map_err(|_| ReportSyncError::auth("Invalid API key format"))?;
        headers.insert("apikey", api_key);
        Ok(headers)
    }

    /// Member access token when one is stored, otherwise the public key.
    fn default_bearer(&self) -> Result<String> {
        let stored = self
            .secrets
            .get_secret(SESSION_ACCESS_TOKEN_KEY)
            .map_err(|e| ReportSyncError::auth(e.to_string()))?;
        Ok(stored.unwrap_or_else(|| self.api_key.clone()))
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    async fn select_reports(&self, filter: &str) -> Result<Vec<RemoteReport>> {
        let url = self.rest_url(&format!("{}?select=*&{}", REPORTS_TABLE, filter));
        debug!("[ReportSync] Report lookup: {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(&self.default_bearer()?)?)
            .send()
            .await?;

        let rows: Vec<HarvestReportRow> = parse_response(response).await?;
        Ok(rows.into_iter().map(RemoteReport::from).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange the stored refresh token for a fresh session.
    ///
    /// POST /auth/v1/token?grant_type=refresh_token
    pub async fn refresh(&self) -> Result<Option<Session>> {
        let refresh_token = self
            .secrets
            .get_secret(SESSION_REFRESH_TOKEN_KEY)
            .map_err(|e| ReportSyncError::auth(e.to_string()))?;
        let Some(refresh_token) = refresh_token else {
            debug!("[ReportSync] No refresh token stored; no member session");
            return Ok(None);
        };

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers(&self.api_key)?)
            .json(&RefreshTokenRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        let token: TokenResponse = match parse_response(response).await {
            Ok(token) => token,
            Err(ReportSyncError::Api { status, message }) if matches!(status, 400 | 401 | 403) => {
                return Err(ReportSyncError::auth(format!(
                    "Session refresh rejected ({}): {}",
                    status, message
                )));
            }
            Err(err) => return Err(err),
        };

        self.secrets
            .set_secret(SESSION_ACCESS_TOKEN_KEY, &token.access_token)
            .and_then(|_| {
                self.secrets
                    .set_secret(SESSION_REFRESH_TOKEN_KEY, &token.refresh_token)
            })
            .map_err(|e| ReportSyncError::auth(format!("Failed to store session: {}", e)))?;

        Ok(Some(Session {
            access_token: token.access_token,
            member_id: token.user.id,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reports
    // ─────────────────────────────────────────────────────────────────────────

    /// POST /rest/v1/rpc/create_harvest_report
    pub async fn create_authenticated(
        &self,
        session: &Session,
        payload: &CanonicalReportPayload,
    ) -> Result<StoredReport> {
        let url = self.rest_url("rpc/create_harvest_report");
        let response = self
            .client
            .post(&url)
            .headers(self.headers(&session.access_token)?)
            .json(&CreateReportRequest { p_report: payload })
            .send()
            .await?;

        parse_response(response).await
    }

    /// POST /rest/v1/rpc/create_harvest_report_anonymous
    pub async fn create_anonymous(
        &self,
        device_identity_id: &str,
        payload: &CanonicalReportPayload,
    ) -> Result<StoredReport> {
        let url = self.rest_url("rpc/create_harvest_report_anonymous");
        let response = self
            .client
            .post(&url)
            .headers(self.headers(&self.api_key)?)
            .json(&CreateAnonymousReportRequest {
                p_device_identity_id: device_identity_id,
                p_report: payload,
            })
            .send()
            .await?;

        parse_response(response).await
    }

    /// GET /rest/v1/harvest_reports?dmf_object_id=eq.{id}
    pub async fn report_by_object_id(&self, object_id: i64) -> Result<Option<RemoteReport>> {
        let filter = format!("dmf_object_id=eq.{}&limit=1", object_id);
        Ok(self.select_reports(&filter).await?.into_iter().next())
    }

    /// GET /rest/v1/harvest_reports?or=(member_id.eq.X,owner_anonymous_id.eq.X)&harvest_date=eq.D&area_code=eq.A
    pub async fn report_by_owner_day_area(
        &self,
        key: &OwnerDayAreaKey,
    ) -> Result<Option<RemoteReport>> {
        let owner = urlencoding::encode(&key.owner_id);
        let filter = format!(
            "or=(member_id.eq.{owner},owner_anonymous_id.eq.{owner})&harvest_date=eq.{}&area_code=eq.{}&order=created_at.asc&limit=1",
            key.harvest_date.format("%Y-%m-%d"),
            urlencoding::encode(&key.area_code),
        );
        Ok(self.select_reports(&filter).await?.into_iter().next())
    }

    /// GET /rest/v1/harvest_reports?webhook_status=eq.failed&webhook_attempts=lt.{max}
    pub async fn failed_deliveries(&self, max_attempts: u32) -> Result<Vec<RemoteReport>> {
        let filter = format!(
            "webhook_status=eq.failed&webhook_attempts=lt.{}&order=created_at.asc",
            max_attempts
        );
        self.select_reports(&filter).await
    }

    /// PATCH /rest/v1/harvest_reports?id=eq.{id}
    pub async fn patch_delivery_status(&self, report_id: &str, update: &WebhookUpdate) -> Result<()> {
        self.patch_report(report_id, &DeliveryStatusPatch::from(update)).await
    }

    /// PATCH /rest/v1/harvest_reports?id=eq.{id}
    pub async fn patch_government_status(
        &self,
        report_id: &str,
        update: &GovernmentStatusUpdate,
    ) -> Result<()> {
        self.patch_report(report_id, &GovernmentStatusPatch::from(update)).await
    }

    async fn patch_report<T>(&self, report_id: &str, body: &T) -> Result<()>
    where
        T: serde::Serialize + Sync,
    {
        let url = self.rest_url(&format!(
            "{}?id=eq.{}",
            REPORTS_TABLE,
            urlencoding::encode(report_id)
        ));
        let mut headers = self.headers(&self.default_bearer()?)?;
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=minimal"),
        );

        let response = self
            .client
            .patch(&url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        parse_empty_response(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Members
    // ─────────────────────────────────────────────────────────────────────────

    /// GET /rest/v1/members?device_identity_id=eq.{id}
    pub async fn member_for_device(&self, device_identity_id: &str) -> Result<Option<MemberIdentity>> {
        let url = self.rest_url(&format!(
            "members?select=*&device_identity_id=eq.{}&limit=1",
            urlencoding::encode(device_identity_id)
        ));
        let response = self
            .client
            .get(&url)
            .headers(self.headers(&self.default_bearer()?)?)
            .send()
            .await?;

        let rows: Vec<MemberRow> = parse_response(response).await?;
        Ok(rows.into_iter().next().map(MemberIdentity::from))
    }

    /// POST /rest/v1/rpc/link_device_reports
    pub async fn link_reports(&self, device_identity_id: &str, member_id: &str) -> Result<usize> {
        let url = self.rest_url("rpc/link_device_reports");
        let response = self
            .client
            .post(&url)
            .headers(self.headers(&self.default_bearer()?)?)
            .json(&LinkDeviceReportsRequest {
                p_device_identity_id: device_identity_id,
                p_member_id: member_id,
            })
            .send()
            .await?;

        let claimed: i64 = parse_response(response).await?;
        info!(
            "[ReportSync] Backend linked {} reports of device {} to member {}",
            claimed, device_identity_id, member_id
        );
        Ok(usize::try_from(claimed).unwrap_or(0))
    }
}

fn remote<T>(stage: &str, result: Result<T>) -> RemoteResult<T> {
    result.map_err(|err| {
        warn!("[ReportSync] {} failed: {}", stage, err);
        RemoteError::from(err)
    })
}

#[async_trait]
impl ReportBackend for BackendClient {
    async fn refresh_session(&self) -> RemoteResult<Option<Session>> {
        remote("Session refresh", self.refresh().await)
    }

    async fn create_report(
        &self,
        session: &Session,
        payload: &CanonicalReportPayload,
    ) -> RemoteResult<StoredReport> {
        remote(
            "Authenticated create",
            self.create_authenticated(session, payload).await,
        )
    }

    async fn create_report_anonymous(
        &self,
        device_identity_id: &str,
        payload: &CanonicalReportPayload,
    ) -> RemoteResult<StoredReport> {
        remote(
            "Anonymous create",
            self.create_anonymous(device_identity_id, payload).await,
        )
    }

    async fn find_report_by_object_id(&self, object_id: i64) -> RemoteResult<Option<RemoteReport>> {
        remote(
            "Lookup by object id",
            self.report_by_object_id(object_id).await,
        )
    }

    async fn find_report_by_owner_day_area(
        &self,
        key: &OwnerDayAreaKey,
    ) -> RemoteResult<Option<RemoteReport>> {
        remote(
            "Lookup by owner/day/area",
            self.report_by_owner_day_area(key).await,
        )
    }

    async fn list_failed_deliveries(&self, max_attempts: u32) -> RemoteResult<Vec<RemoteReport>> {
        remote(
            "Failed delivery listing",
            self.failed_deliveries(max_attempts).await,
        )
    }

    async fn update_delivery_status(
        &self,
        report_id: &str,
        update: &WebhookUpdate,
    ) -> RemoteResult<()> {
        remote(
            "Delivery status update",
            self.patch_delivery_status(report_id, update).await,
        )
    }

    async fn update_government_status(
        &self,
        report_id: &str,
        update: &GovernmentStatusUpdate,
    ) -> RemoteResult<()> {
        remote(
            "Government status update",
            self.patch_government_status(report_id, update).await,
        )
    }

    async fn find_member_for_device(
        &self,
        device_identity_id: &str,
    ) -> RemoteResult<Option<MemberIdentity>> {
        remote(
            "Member lookup",
            self.member_for_device(device_identity_id).await,
        )
    }

    async fn link_device_reports(
        &self,
        device_identity_id: &str,
        member_id: &str,
    ) -> RemoteResult<usize> {
        remote(
            "Device report link",
            self.link_reports(device_identity_id, member_id).await,
        )
    }
}
