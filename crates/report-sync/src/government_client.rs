//! Government harvest reporting endpoint.

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};

use catchlog_core::reports::HarvestInput;
use catchlog_core::submissions::{GovernmentSubmissionClient, SubmissionOutcome};
use catchlog_core::sync::SyncRetryClass;

use crate::error::{ReportSyncError, Result};
use crate::http::{build_client, json_headers, parse_response, DEFAULT_TIMEOUT_SECS};
use crate::types::{GovernmentSubmissionRequest, GovernmentSubmissionResponse};

#[derive(Debug, Clone)]
pub struct GovernmentClient {
    client: reqwest::Client,
    base_url: String,
}

impl GovernmentClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST {base}/submissions
    pub async fn post_submission(
        &self,
        input: &HarvestInput,
    ) -> Result<GovernmentSubmissionResponse> {
        let url = format!("{}/submissions", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(json_headers(None)?)
            .json(&GovernmentSubmissionRequest::from(input))
            .send()
            .await?;

        parse_response(response).await
    }
}

#[async_trait]
impl GovernmentSubmissionClient for GovernmentClient {
    async fn submit(&self, input: &HarvestInput) -> SubmissionOutcome {
        match self.post_submission(input).await {
            Ok(GovernmentSubmissionResponse {
                confirmation_number: Some(confirmation_number),
                object_id,
                ..
            }) if !confirmation_number.trim().is_empty() => {
                info!(
                    "[Government] Harvest for area {} accepted as {}",
                    input.area_code, confirmation_number
                );
                SubmissionOutcome::Accepted {
                    confirmation_number,
                    object_id,
                }
            }
            Ok(response) => SubmissionOutcome::Rejected {
                error: response
                    .error
                    .unwrap_or_else(|| "Response carried no confirmation number".to_string()),
            },
            Err(err) => {
                warn!(
                    "[Government] Submission for area {} failed: {}",
                    input.area_code, err
                );
                outcome_for_error(err)
            }
        }
    }
}

fn outcome_for_error(err: ReportSyncError) -> SubmissionOutcome {
    let error = err.to_string();
    match err.retry_class() {
        SyncRetryClass::Retryable => SubmissionOutcome::Queued { error },
        SyncRetryClass::Permanent | SyncRetryClass::ReauthRequired => {
            SubmissionOutcome::Rejected { error }
        }
    }
}
