//! Core domain types and traits for the asyncjobs job-processing API.
//!
//! This crate contains:
//! - Job identifiers and stored job records
//! - Request validation for job admission
//! - Invocation and failure payloads exchanged with the dispatcher
//! - Executor and failure handler traits

pub mod error;
pub mod executor;
pub mod id;
pub mod job;

pub use error::{Error, Result};
pub use id::JobId;
