//! Application state.

use asyncjobs_db::JobRepo;
use asyncjobs_scheduler::JobQueue;
use std::sync::Arc;

/// Shared application state. Built once at start, read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn JobRepo>,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(repo: Arc<dyn JobRepo>, queue: JobQueue) -> Self {
        Self { repo, queue }
    }
}
