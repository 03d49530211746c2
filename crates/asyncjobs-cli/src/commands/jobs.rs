//! Job commands against a running API server.

use anyhow::{Context, Result, bail};
use asyncjobs_core::JobId;
use asyncjobs_core::job::{JobRecord, JobState, JobStatus};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

async fn error_text(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => status.to_string(),
    }
}

async fn fetch_status(client: &reqwest::Client, api_url: &str, id: &str) -> Result<Value> {
    let response = client
        .get(format!("{}/jobs/{}", api_url.trim_end_matches('/'), id))
        .send()
        .await
        .context("Failed to reach API server")?;
    if !response.status().is_success() {
        bail!("Status query failed: {}", error_text(response).await);
    }
    Ok(response.json().await?)
}

/// Lifecycle state of a status response.
///
/// A body without a recognised `status` is still pending.
pub(crate) fn state_of(id: &str, body: &Value) -> JobState {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<JobStatus>().ok());
    let record = status.map(|status| JobRecord {
        id: JobId::from(id),
        parameters: body.get("parameters").map(Value::to_string),
        results: body.get("results").map(Value::to_string),
        status: Some(status),
    });
    JobState::from_lookup(record.as_ref())
}

/// Describe a job state in one line.
pub(crate) fn describe(state: &JobState) -> String {
    match state {
        JobState::Succeeded {
            results: Some(results),
        } => format!("Success: {}", results),
        JobState::Succeeded { results: None } => "Success".to_string(),
        JobState::Failed { parameters } => format!(
            "Failure (parameters: {})",
            parameters.as_deref().unwrap_or("null")
        ),
        JobState::Pending => "Pending (not yet complete or unknown)".to_string(),
    }
}

pub async fn submit(api_url: &str, seconds: u64, poll: Option<Duration>) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/jobs", api_url.trim_end_matches('/')))
        .json(&json!({ "seconds": seconds }))
        .send()
        .await
        .context("Failed to reach API server")?;
    if !response.status().is_success() {
        bail!("Submission rejected: {}", error_text(response).await);
    }

    let SubmitResponse { id } = response.json().await?;
    println!("{}", id);

    let Some(interval) = poll else {
        return Ok(());
    };

    loop {
        tokio::time::sleep(interval).await;
        let body = fetch_status(&client, api_url, &id).await?;
        let state = state_of(&id, &body);
        if state.is_terminal() {
            println!("{}", describe(&state));
            return Ok(());
        }
    }
}

pub async fn status(api_url: &str, id: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let body = fetch_status(&client, api_url, id).await?;
    println!("{}", describe(&state_of(id, &body)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe_body(body: Value) -> String {
        describe(&state_of("job-1", &body))
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe_body(json!({})), "Pending (not yet complete or unknown)");
        assert_eq!(
            describe_body(json!({ "status": "Success", "results": { "message": "hi" } })),
            r#"Success: {"message":"hi"}"#
        );
        assert_eq!(
            describe_body(json!({ "status": "Failure", "parameters": { "seconds": 301 } })),
            r#"Failure (parameters: {"seconds":301})"#
        );
        assert_eq!(describe_body(json!({ "status": "Success" })), "Success");
    }

    #[test]
    fn test_state_of_status_body() {
        assert_eq!(state_of("job-1", &json!({})), JobState::Pending);
        assert_eq!(
            state_of("job-1", &json!({ "status": "Queued" })),
            JobState::Pending
        );
        assert!(state_of("job-1", &json!({ "status": "Failure" })).is_terminal());
    }
}
