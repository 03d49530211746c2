//! Job dispatch for asyncjobs.
//!
//! Admission enqueues invocations and returns at once. A worker drains the
//! queue, runs each invocation on its own task under a concurrency ceiling,
//! and hands abnormal terminations to the failure handler.

pub mod error;
pub mod queue;
pub mod worker;

pub use error::DispatchError;
pub use queue::{JobQueue, QueueReceiver, QueuedInvocation};
pub use worker::{Worker, WorkerConfig};
