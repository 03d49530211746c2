//! HTTP API server for asyncjobs.
//!
//! `POST /jobs` admits a job and returns its id at once; `GET /jobs/{jobId}`
//! reports whatever the store holds for it.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
