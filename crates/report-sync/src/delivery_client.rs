//! Delivery-confirmation webhook (SMS / email).

use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use catchlog_core::delivery::{DeliveryPayload, DeliveryResult, DeliveryService};

use crate::error::Result;
use crate::http::{build_client, json_headers, parse_response, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    url: String,
}

impl DeliveryClient {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            url: url.to_string(),
        })
    }

    /// POST {url}
    pub async fn post(&self, payload: &DeliveryPayload) -> Result<DeliveryResult> {
        let response = self
            .client
            .post(&self.url)
            .headers(json_headers(None)?)
            .json(payload)
            .send()
            .await?;

        parse_response(response).await
    }
}

#[async_trait]
impl DeliveryService for DeliveryClient {
    async fn deliver(&self, payload: &DeliveryPayload) -> DeliveryResult {
        match self.post(payload).await {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    "[Delivery] Webhook call for report {} failed: {}",
                    payload.global_id, err
                );
                DeliveryResult::failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{start_mock_server, MockOutcome};

    fn payload() -> DeliveryPayload {
        serde_json::from_value(serde_json::json!({
            "globalId": "remote-1",
            "confirmationNumber": "DMF-1001",
            "objectId": 42,
            "harvestDate": "2026-05-04",
            "areaCode": "CORE",
            "areaLabel": null,
            "speciesCounts": { "redDrum": 1 },
            "firstName": "Ada",
            "lastName": "Byrd",
            "phone": "9195550100",
            "email": null,
            "wantsTextConfirmation": true,
            "wantsEmailConfirmation": false
        }))
        .expect("payload")
    }

    #[tokio::test]
    async fn posts_payload_and_reads_result() {
        let server = start_mock_server(vec![MockOutcome::json(200, r#"{"success":true}"#)]).await;
        let client = DeliveryClient::new(&format!("{}/confirmations", server.base_url))
            .expect("client");

        let result = client.deliver(&payload()).await;

        assert!(result.success);
        assert!(result.errors.is_empty());
        let requests = server.requests().await;
        assert_eq!(requests[0].target, "/confirmations");
        assert_eq!(requests[0].json()["globalId"], "remote-1");
        assert_eq!(requests[0].json()["confirmationNumber"], "DMF-1001");
    }

    #[tokio::test]
    async fn partial_failure_is_passed_through() {
        let server = start_mock_server(vec![MockOutcome::json(
            200,
            r#"{"success":false,"errors":["sms: invalid number"]}"#,
        )])
        .await;
        let client = DeliveryClient::new(&server.base_url).expect("client");

        let result = client.deliver(&payload()).await;

        assert!(!result.success);
        assert_eq!(result.errors, vec!["sms: invalid number".to_string()]);
    }

    #[tokio::test]
    async fn http_error_becomes_failed_result() {
        let server =
            start_mock_server(vec![MockOutcome::json(500, r#"{"message":"boom"}"#)]).await;
        let client = DeliveryClient::new(&server.base_url).expect("client");

        let result = client.deliver(&payload()).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("boom"));
    }
}
