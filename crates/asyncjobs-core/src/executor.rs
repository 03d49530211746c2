//! Executor traits and the payloads exchanged with the dispatcher.
//!
//! An invocation carries `{id, parameters}` from admission to the executor.
//! When an invocation terminates abnormally the dispatcher wraps the original
//! payload in a [`FailureEvent`] and hands it to a [`FailureHandler`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, JobId, Result};

/// Payload delivered to an executor for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationPayload {
    pub id: JobId,
    /// Parameters exactly as supplied at admission.
    pub parameters: Value,
}

impl InvocationPayload {
    pub fn new(id: JobId, parameters: Value) -> Self {
        Self { id, parameters }
    }
}

/// Why an invocation was routed to the failure handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCondition {
    /// The invocation failed on its last permitted attempt.
    RetriesExhausted,
    /// The invocation sat in the queue longer than the maximum event age.
    EventAgeExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub request_id: JobId,
    pub condition: FailureCondition,
    pub approximate_invoke_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseContext {
    pub function_error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_message: String,
    pub error_type: String,
}

/// Envelope describing an abnormal termination of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEvent {
    #[serde(default = "FailureEvent::default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<RequestContext>,
    pub request_payload: InvocationPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_context: Option<ResponseContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<ErrorPayload>,
}

impl FailureEvent {
    fn default_version() -> String {
        "1.0".to_string()
    }

    /// Build the event for an invocation that failed with `error`.
    pub fn from_error(
        payload: InvocationPayload,
        condition: FailureCondition,
        invoke_count: u32,
        error: &Error,
    ) -> Self {
        Self {
            version: Self::default_version(),
            timestamp: Utc::now(),
            request_context: Some(RequestContext {
                request_id: payload.id.clone(),
                condition,
                approximate_invoke_count: invoke_count,
            }),
            request_payload: payload,
            response_context: Some(ResponseContext {
                function_error: "Unhandled".to_string(),
            }),
            response_payload: Some(ErrorPayload {
                error_message: error.to_string(),
                error_type: error.kind().to_string(),
            }),
        }
    }

    /// Build the event for an invocation that was never attempted.
    pub fn expired(payload: InvocationPayload, invoke_count: u32) -> Self {
        Self {
            version: Self::default_version(),
            timestamp: Utc::now(),
            request_context: Some(RequestContext {
                request_id: payload.id.clone(),
                condition: FailureCondition::EventAgeExceeded,
                approximate_invoke_count: invoke_count,
            }),
            request_payload: payload,
            response_context: None,
            response_payload: None,
        }
    }
}

/// Runs the unit of work for one invocation.
///
/// Returning `Err` is an abnormal termination; recording it is the
/// dispatcher's and failure handler's concern, never the executor's.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Execute one invocation.
    async fn invoke(&self, payload: &InvocationPayload) -> Result<()>;
}

/// Receives invocations that terminated abnormally.
#[async_trait]
pub trait FailureHandler: Send + Sync {
    async fn on_failure(&self, event: &FailureEvent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_event_parses_minimal_envelope() {
        let event: FailureEvent = serde_json::from_value(json!({
            "requestPayload": {
                "id": "1",
                "parameters": { "seconds": 301 }
            }
        }))
        .unwrap();

        assert_eq!(event.request_payload.id, JobId::from("1"));
        assert_eq!(event.request_payload.parameters, json!({ "seconds": 301 }));
        assert_eq!(event.version, "1.0");
        assert!(event.request_context.is_none());
    }

    #[test]
    fn test_failure_event_from_error() {
        let payload = InvocationPayload::new(JobId::from("1"), json!({ "seconds": 301 }));
        let err = Error::TimeoutExceeded {
            seconds: 301,
            timeout: 300,
        };
        let event =
            FailureEvent::from_error(payload.clone(), FailureCondition::RetriesExhausted, 1, &err);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["requestPayload"]["id"], "1");
        assert_eq!(value["requestContext"]["condition"], "RetriesExhausted");
        assert_eq!(value["requestContext"]["approximateInvokeCount"], 1);
        assert_eq!(value["responsePayload"]["errorMessage"], "301 major then 300");
        assert_eq!(value["responsePayload"]["errorType"], "TimeoutExceeded");
        assert_eq!(event.request_payload, payload);
    }

    #[test]
    fn test_expired_event_has_no_error() {
        let payload = InvocationPayload::new(JobId::from("9"), json!({ "seconds": 1 }));
        let event = FailureEvent::expired(payload, 0);
        assert!(event.response_payload.is_none());
        assert_eq!(
            event.request_context.unwrap().condition,
            FailureCondition::EventAgeExceeded
        );
    }
}
