//! Failure recording.

use async_trait::async_trait;
use asyncjobs_core::Result;
use asyncjobs_core::executor::{FailureEvent, FailureHandler};
use asyncjobs_core::job::JobRecord;
use asyncjobs_db::JobRepo;
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes the terminal Failure record for an abnormally terminated invocation.
///
/// This is the only writer of Failure status. The record keeps the original
/// parameters, serialized as received, and never carries results.
pub struct FailureRecorder {
    repo: Arc<dyn JobRepo>,
}

impl FailureRecorder {
    pub fn new(repo: Arc<dyn JobRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl FailureHandler for FailureRecorder {
    async fn on_failure(&self, event: &FailureEvent) -> Result<()> {
        debug!(?event, "Received failure event");

        let payload = &event.request_payload;
        let record = JobRecord::failure(payload.id.clone(), &payload.parameters)?;
        self.repo.put(&record).await?;

        let reason = event
            .response_payload
            .as_ref()
            .map(|p| p.error_message.as_str())
            .unwrap_or("no error reported");
        warn!(job_id = %payload.id, reason, "Recorded job failure");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asyncjobs_core::JobId;
    use asyncjobs_core::job::JobStatus;
    use asyncjobs_db::InMemoryJobRepo;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_failure_with_parameters() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let recorder = FailureRecorder::new(repo.clone());

        let event: FailureEvent = serde_json::from_value(json!({
            "requestPayload": {
                "id": "1",
                "parameters": { "seconds": 301 }
            }
        }))
        .unwrap();
        recorder.on_failure(&event).await.unwrap();

        let record = repo.get(&JobId::from("1")).await.unwrap().unwrap();
        assert_eq!(record.status, Some(JobStatus::Failure));
        assert_eq!(
            record.parameters.as_deref(),
            Some(serde_json::to_string(&json!({ "seconds": 301 })).unwrap().as_str())
        );
        assert!(record.results.is_none());
    }

    #[tokio::test]
    async fn test_parameters_kept_verbatim_even_when_unparseable() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let recorder = FailureRecorder::new(repo.clone());

        let event: FailureEvent = serde_json::from_value(json!({
            "version": "1.0",
            "requestContext": {
                "requestId": "x",
                "condition": "RetriesExhausted",
                "approximateInvokeCount": 1
            },
            "requestPayload": {
                "id": "x",
                "parameters": { "seconds": "soon", "extra": [1, 2] }
            },
            "responsePayload": {
                "errorMessage": "invalid input",
                "errorType": "InvalidInput"
            }
        }))
        .unwrap();
        recorder.on_failure(&event).await.unwrap();

        let record = repo.get(&JobId::from("x")).await.unwrap().unwrap();
        let stored: serde_json::Value =
            serde_json::from_str(record.parameters.as_deref().unwrap()).unwrap();
        assert_eq!(stored, json!({ "seconds": "soon", "extra": [1, 2] }));
    }
}
