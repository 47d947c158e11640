use async_trait::async_trait;

use crate::reports::HarvestInput;

use super::SubmissionOutcome;

/// Port to the government reporting endpoint.
///
/// The field-level payload format is owned by the implementation. A
/// network-class failure must come back as [`SubmissionOutcome::Queued`] so
/// the caller keeps the input for a later retry.
#[async_trait]
pub trait GovernmentSubmissionClient: Send + Sync {
    async fn submit(&self, input: &HarvestInput) -> SubmissionOutcome;
}
