//! Worker that drains the queue and runs invocations.

use asyncjobs_config::SystemConfig;
use asyncjobs_core::Error;
use asyncjobs_core::executor::{
    Executor, FailureCondition, FailureEvent, FailureHandler, InvocationPayload,
};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::queue::{QueueReceiver, QueuedInvocation};

/// Invocation policy applied by the worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of invocations running at once.
    pub max_concurrency: usize,
    /// Extra attempts after an abnormal termination.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Invocations that waited longer than this are failed without running.
    pub max_event_age: Duration,
    /// Hard limit for one invocation.
    pub execution_timeout: Duration,
    /// Limit for one failure recording.
    pub failure_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

impl From<&SystemConfig> for WorkerConfig {
    fn from(config: &SystemConfig) -> Self {
        Self {
            max_concurrency: config.executor.max_concurrency,
            retry_attempts: config.dispatch.retry_attempts,
            retry_delay: config.dispatch.retry_delay(),
            max_event_age: config.dispatch.max_event_age(),
            execution_timeout: config.executor.execution_timeout(),
            failure_timeout: config.dispatch.failure_timeout(),
        }
    }
}

struct Inner {
    executor: Arc<dyn Executor>,
    failure_handler: Arc<dyn FailureHandler>,
    config: WorkerConfig,
}

/// A worker that runs queued invocations concurrently.
///
/// Every invocation runs on its own task; a semaphore caps how many run at
/// once. There is no cancellation: an invocation ends by completing, failing,
/// or hitting the hard execution timeout.
pub struct Worker {
    inner: Arc<Inner>,
    permits: Arc<Semaphore>,
}

impl Worker {
    pub fn new(
        executor: Arc<dyn Executor>,
        failure_handler: Arc<dyn FailureHandler>,
        config: WorkerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            inner: Arc::new(Inner {
                executor,
                failure_handler,
                config,
            }),
            permits,
        }
    }

    /// Run until the queue is closed and every in-flight invocation finished.
    pub async fn run(&self, mut receiver: QueueReceiver) {
        info!(
            executor = self.inner.executor.name(),
            max_concurrency = self.inner.config.max_concurrency,
            "Starting worker"
        );

        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                next = receiver.recv() => {
                    let Some(invocation) = next else {
                        break;
                    };
                    let Ok(permit) = self.permits.clone().acquire_owned().await else {
                        break;
                    };
                    let inner = self.inner.clone();
                    tasks.spawn(async move {
                        inner.process(invocation).await;
                        drop(permit);
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }
            }
        }

        info!(in_flight = tasks.len(), "Queue closed, draining invocations");
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        info!("Worker stopped");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Invocation task aborted");
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Inner {
    async fn process(&self, mut invocation: QueuedInvocation) {
        loop {
            if invocation.enqueued_at.elapsed() > self.config.max_event_age {
                warn!(
                    job_id = %invocation.payload.id,
                    attempt = invocation.attempt,
                    "Invocation exceeded maximum event age"
                );
                let event = FailureEvent::expired(invocation.payload, invocation.attempt);
                self.record_failure(event).await;
                return;
            }

            invocation.attempt += 1;
            let err = match self.invoke_once(&invocation.payload).await {
                Ok(()) => return,
                Err(err) => err,
            };

            warn!(
                job_id = %invocation.payload.id,
                attempt = invocation.attempt,
                error = %err,
                "Invocation failed"
            );

            if invocation.attempt <= self.config.retry_attempts {
                sleep(self.config.retry_delay).await;
                continue;
            }

            let event = FailureEvent::from_error(
                invocation.payload,
                FailureCondition::RetriesExhausted,
                invocation.attempt,
                &err,
            );
            self.record_failure(event).await;
            return;
        }
    }

    /// Run the executor on its own task so panics and overruns are contained.
    async fn invoke_once(&self, payload: &InvocationPayload) -> asyncjobs_core::Result<()> {
        let executor = self.executor.clone();
        let task_payload = payload.clone();
        let handle = tokio::spawn(async move { executor.invoke(&task_payload).await });
        let abort = handle.abort_handle();

        match timeout(self.config.execution_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => Err(Error::ExecutionFailed(format!(
                "invocation panicked: {}",
                panic_message(join_err.into_panic())
            ))),
            Ok(Err(join_err)) => Err(Error::Internal(join_err.to_string())),
            Err(_) => {
                abort.abort();
                Err(Error::Timeout(format!(
                    "invocation exceeded {}s",
                    self.config.execution_timeout.as_secs()
                )))
            }
        }
    }

    /// A failed recording is final; it is logged and dropped.
    async fn record_failure(&self, event: FailureEvent) {
        let job_id = event.request_payload.id.clone();
        match timeout(
            self.config.failure_timeout,
            self.failure_handler.on_failure(&event),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(job_id = %job_id, error = %e, "Failed to record job failure"),
            Err(_) => error!(job_id = %job_id, "Timed out recording job failure"),
        }
    }
}
