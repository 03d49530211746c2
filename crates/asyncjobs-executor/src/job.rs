//! The job executor.

use async_trait::async_trait;
use asyncjobs_core::executor::{Executor, InvocationPayload};
use asyncjobs_core::job::{JobParameters, JobRecord};
use asyncjobs_core::{Error, Result};
use asyncjobs_db::JobRepo;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The actual unit of work performed for a job.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Run the work and return the result payload.
    async fn run(&self, params: &JobParameters) -> Result<Value>;
}

#[derive(Debug, Serialize)]
struct SleepResult {
    message: String,
}

/// Workload that waits for `seconds` and reports having done so.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepWorkload;

#[async_trait]
impl Workload for SleepWorkload {
    async fn run(&self, params: &JobParameters) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(params.seconds)).await;
        let result = SleepResult {
            message: format!("I slept for {} seconds", params.seconds),
        };
        serde_json::to_value(result).map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Reject work that asks for more time than the executor allows.
pub fn check_timeout(seconds: u64, timeout: u64) -> Result<()> {
    if seconds > timeout {
        return Err(Error::TimeoutExceeded { seconds, timeout });
    }
    Ok(())
}

/// Executes one job and writes its Success record.
///
/// Never writes Failure: every error is returned to the caller, which routes
/// it to the failure recorder.
pub struct JobExecutor {
    repo: Arc<dyn JobRepo>,
    workload: Arc<dyn Workload>,
    timeout: u64,
}

impl JobExecutor {
    pub fn new(repo: Arc<dyn JobRepo>, timeout: u64) -> Self {
        Self::with_workload(repo, Arc::new(SleepWorkload), timeout)
    }

    pub fn with_workload(repo: Arc<dyn JobRepo>, workload: Arc<dyn Workload>, timeout: u64) -> Self {
        Self {
            repo,
            workload,
            timeout,
        }
    }
}

#[async_trait]
impl Executor for JobExecutor {
    fn name(&self) -> &'static str {
        "job"
    }

    async fn invoke(&self, payload: &InvocationPayload) -> Result<()> {
        debug!(?payload, "Received invocation");

        let params = JobParameters::from_value(&payload.parameters)?;
        check_timeout(params.seconds, self.timeout)?;

        info!(
            job_id = %payload.id,
            seconds = params.seconds,
            timeout = self.timeout,
            "Running job"
        );
        let results = self.workload.run(&params).await?;

        let record = JobRecord::success(payload.id.clone(), &results)?;
        self.repo.put(&record).await?;

        info!(job_id = %payload.id, "Job succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asyncjobs_core::JobId;
    use asyncjobs_core::job::JobStatus;
    use asyncjobs_db::{DbError, DbResult, InMemoryJobRepo};
    use serde_json::json;

    const TIMEOUT: u64 = 300;

    fn payload(id: &str, seconds: u64) -> InvocationPayload {
        InvocationPayload::new(JobId::from(id), json!({ "seconds": seconds }))
    }

    fn results_message(record: &JobRecord) -> String {
        let results: Value = serde_json::from_str(record.results.as_deref().unwrap()).unwrap();
        results["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_check_timeout() {
        assert!(check_timeout(1, TIMEOUT).is_ok());
        assert!(check_timeout(TIMEOUT, TIMEOUT).is_ok());
        let err = check_timeout(TIMEOUT + 1, TIMEOUT).unwrap_err();
        assert_eq!(err.to_string(), "301 major then 300");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_writes_record() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let executor = JobExecutor::new(repo.clone(), TIMEOUT);

        executor.invoke(&payload("2", 1)).await.unwrap();

        let record = repo.get(&JobId::from("2")).await.unwrap().unwrap();
        assert_eq!(record.status, Some(JobStatus::Success));
        assert_eq!(record.results.as_deref(), Some(r#"{"message":"I slept for 1 seconds"}"#));
        assert!(record.parameters.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_across_permitted_range() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let executor = JobExecutor::new(repo.clone(), TIMEOUT);

        for seconds in [1, 2, 59, 150, TIMEOUT] {
            let id = format!("job-{}", seconds);
            executor.invoke(&payload(&id, seconds)).await.unwrap();

            let record = repo.get(&JobId::from(id)).await.unwrap().unwrap();
            assert_eq!(record.status, Some(JobStatus::Success));
            assert_eq!(
                results_message(&record),
                format!("I slept for {} seconds", seconds)
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_for_requested_duration() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let executor = JobExecutor::new(repo, TIMEOUT);

        let started = tokio::time::Instant::now();
        executor.invoke(&payload("2", 7)).await.unwrap();
        assert_eq!(started.elapsed().as_secs(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exceeded_writes_nothing() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let executor = JobExecutor::new(repo.clone(), TIMEOUT);

        for seconds in [TIMEOUT + 1, 1000] {
            let err = executor.invoke(&payload("1", seconds)).await.unwrap_err();
            assert!(matches!(err, Error::TimeoutExceeded { .. }));
            assert_eq!(err.to_string(), format!("{} major then {}", seconds, TIMEOUT));
        }
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_rejected() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let executor = JobExecutor::new(repo.clone(), TIMEOUT);

        let bad = InvocationPayload::new(JobId::from("3"), json!({ "seconds": "ten" }));
        let err = executor.invoke(&bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_execution_converges() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let executor = JobExecutor::new(repo.clone(), TIMEOUT);

        executor.invoke(&payload("2", 1)).await.unwrap();
        let first = repo.get(&JobId::from("2")).await.unwrap();
        executor.invoke(&payload("2", 1)).await.unwrap();
        let second = repo.get(&JobId::from("2")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.len(), 1);
    }

    struct UnavailableRepo;

    #[async_trait]
    impl JobRepo for UnavailableRepo {
        async fn put(&self, _record: &JobRecord) -> DbResult<()> {
            Err(DbError::Corrupt("store unavailable".to_string()))
        }

        async fn get(&self, _id: &JobId) -> DbResult<Option<JobRecord>> {
            Err(DbError::Corrupt("store unavailable".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_is_returned() {
        let executor = JobExecutor::new(Arc::new(UnavailableRepo), TIMEOUT);
        let err = executor.invoke(&payload("2", 1)).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    struct EchoWorkload;

    #[async_trait]
    impl Workload for EchoWorkload {
        async fn run(&self, params: &JobParameters) -> Result<Value> {
            Ok(json!({ "echo": params.seconds }))
        }
    }

    #[tokio::test]
    async fn test_custom_workload() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let executor = JobExecutor::with_workload(repo.clone(), Arc::new(EchoWorkload), TIMEOUT);

        executor.invoke(&payload("e", 42)).await.unwrap();
        let record = repo.get(&JobId::from("e")).await.unwrap().unwrap();
        assert_eq!(record.results.as_deref(), Some(r#"{"echo":42}"#));
    }
}
