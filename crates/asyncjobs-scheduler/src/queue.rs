//! In-process job queue.

use asyncjobs_core::executor::InvocationPayload;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::DispatchError;

/// An invocation waiting to run.
#[derive(Debug, Clone)]
pub struct QueuedInvocation {
    pub payload: InvocationPayload,
    pub enqueued_at: Instant,
    /// Invocations made so far.
    pub attempt: u32,
}

/// Sending half of the queue. Cheap to clone; the queue closes once every
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueuedInvocation>,
}

/// Receiving half of the queue, consumed by a [`crate::Worker`].
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<QueuedInvocation>,
}

impl JobQueue {
    pub fn new() -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, QueueReceiver { rx })
    }

    /// Enqueue an invocation without waiting for it to run.
    pub fn enqueue(&self, payload: InvocationPayload) -> Result<(), DispatchError> {
        let id = payload.id.clone();
        self.tx
            .send(QueuedInvocation {
                payload,
                enqueued_at: Instant::now(),
                attempt: 0,
            })
            .map_err(|_| DispatchError::QueueClosed)?;
        debug!(job_id = %id, "Enqueued invocation");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl QueueReceiver {
    /// Next invocation, or `None` once all senders are gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<QueuedInvocation> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asyncjobs_core::JobId;
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_and_receive_in_order() {
        let (queue, mut rx) = JobQueue::new();
        queue
            .enqueue(InvocationPayload::new(JobId::from("a"), json!({ "seconds": 1 })))
            .unwrap();
        queue
            .enqueue(InvocationPayload::new(JobId::from("b"), json!({ "seconds": 2 })))
            .unwrap();
        drop(queue);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.payload.id, JobId::from("a"));
        assert_eq!(first.attempt, 0);
        assert_eq!(rx.recv().await.unwrap().payload.id, JobId::from("b"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_dropped() {
        let (queue, rx) = JobQueue::new();
        drop(rx);
        assert!(queue.is_closed());
        let result = queue.enqueue(InvocationPayload::new(JobId::from("a"), json!({})));
        assert!(matches!(result, Err(DispatchError::QueueClosed)));
    }
}
