//! Job execution for asyncjobs.
//!
//! - `JobExecutor` runs one invocation and records its success
//! - `FailureRecorder` records invocations that terminated abnormally

pub mod failure;
pub mod job;

pub use asyncjobs_core::executor::{
    Executor, FailureCondition, FailureEvent, FailureHandler, InvocationPayload,
};
pub use failure::FailureRecorder;
pub use job::{JobExecutor, SleepWorkload, Workload, check_timeout};
