//! Local job execution command.

use anyhow::Result;
use asyncjobs_config::SystemConfig;
use asyncjobs_core::JobId;
use asyncjobs_core::executor::InvocationPayload;
use asyncjobs_db::{InMemoryJobRepo, JobRepo};
use asyncjobs_executor::{FailureRecorder, JobExecutor};
use asyncjobs_scheduler::{JobQueue, Worker, WorkerConfig};
use serde_json::{Value, json};
use std::sync::Arc;

use super::jobs::{describe, state_of};

/// Run one job through the full dispatch path and return the stored record
/// as the status endpoint would render it.
pub(crate) async fn execute_local(seconds: u64, timeout: u64) -> Result<Value> {
    let repo = Arc::new(InMemoryJobRepo::new());
    let executor = Arc::new(JobExecutor::new(repo.clone(), timeout));
    let recorder = Arc::new(FailureRecorder::new(repo.clone()));
    let mut config = SystemConfig::default();
    config.executor.timeout = timeout;
    let worker = Worker::new(executor, recorder, WorkerConfig::from(&config));

    let id = JobId::generate();
    let (queue, receiver) = JobQueue::new();
    queue.enqueue(InvocationPayload::new(id.clone(), json!({ "seconds": seconds })))?;
    drop(queue);
    worker.run(receiver).await;

    let Some(record) = repo.get(&id).await? else {
        return Ok(json!({}));
    };
    let mut body = serde_json::Map::new();
    if let Some(parameters) = record.parameters {
        body.insert("parameters".into(), serde_json::from_str(&parameters)?);
    }
    if let Some(results) = record.results {
        body.insert("results".into(), serde_json::from_str(&results)?);
    }
    if let Some(status) = record.status {
        body.insert("status".into(), Value::from(status.as_str()));
    }
    Ok(Value::Object(body))
}

pub async fn run_local(seconds: u64, timeout: u64) -> Result<()> {
    println!("Running job locally ({}s, timeout {}s)", seconds, timeout);
    let body = execute_local(seconds, timeout).await?;
    println!("{}", describe(&state_of("local", &body)));
    Ok(())
}
