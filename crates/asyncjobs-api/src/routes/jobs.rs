//! Job admission and status endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;
use asyncjobs_core::JobId;
use asyncjobs_core::executor::InvocationPayload;
use asyncjobs_core::job::{JobRecord, JobRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_job))
        .route("/{job_id}", get(get_job))
}

#[derive(Debug, Serialize)]
struct SubmitJobResponse {
    id: String,
}

/// Validate the body, hand the job to the dispatcher, and return its id
/// without waiting for execution.
async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmitJobResponse>, ApiError> {
    let Json(body) = body?;
    let params = JobRequest::from_body(&body)?.validate()?;

    let id = JobId::generate();
    state
        .queue
        .enqueue(InvocationPayload::new(id.clone(), body))?;

    info!(job_id = %id, seconds = params.seconds, "Accepted job");
    Ok(Json(SubmitJobResponse {
        id: id.into_inner(),
    }))
}

/// Stored fields of a job; absent fields are omitted.
#[derive(Debug, Default, Serialize)]
struct JobStatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

// Stored text is JSON written by this service; anything else is passed
// through as a plain string.
fn stored_json(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            parameters: record.parameters.map(stored_json),
            results: record.results.map(stored_json),
            status: record.status.map(|s| s.as_str().to_string()),
        }
    }
}

/// A job with no record yet is reported as an empty object, not an error.
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let record = state.repo.get(&JobId::from(job_id)).await?;
    Ok(Json(record.map(JobStatusResponse::from).unwrap_or_default()))
}
