//! Job records, lifecycle state and request validation.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, JobId, Result};

/// Terminal status of a job as written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum JobStatus {
    Success,
    Failure,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "Success",
            JobStatus::Failure => "Failure",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Success" => Ok(JobStatus::Success),
            "Failure" => Ok(JobStatus::Failure),
            other => Err(Error::InvalidInput(format!("unknown job status: {}", other))),
        }
    }
}

/// A stored job record.
///
/// Text fields hold serialized JSON. A record without `status` is never
/// written by this crate's components but is tolerated on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl JobRecord {
    /// Record written by a successful execution.
    pub fn success(id: JobId, results: &impl Serialize) -> Result<Self> {
        let results = serde_json::to_string(results)
            .map_err(|e| Error::Internal(format!("failed to serialize results: {}", e)))?;
        Ok(Self {
            id,
            parameters: None,
            results: Some(results),
            status: Some(JobStatus::Success),
        })
    }

    /// Record written by the failure recorder. `parameters` is stored as given.
    pub fn failure(id: JobId, parameters: &Value) -> Result<Self> {
        let parameters = serde_json::to_string(parameters)
            .map_err(|e| Error::Internal(format!("failed to serialize parameters: {}", e)))?;
        Ok(Self {
            id,
            parameters: Some(parameters),
            results: None,
            status: Some(JobStatus::Failure),
        })
    }

    pub fn state(&self) -> JobState {
        match self.status {
            Some(JobStatus::Success) => JobState::Succeeded {
                results: self.results.clone(),
            },
            Some(JobStatus::Failure) => JobState::Failed {
                parameters: self.parameters.clone(),
            },
            None => JobState::Pending,
        }
    }
}

/// Lifecycle of a job as seen by a status query.
///
/// The store has no pending rows; a lookup miss maps to `Pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded { results: Option<String> },
    Failed { parameters: Option<String> },
}

impl JobState {
    pub fn from_lookup(record: Option<&JobRecord>) -> Self {
        record.map(JobRecord::state).unwrap_or(JobState::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending)
    }
}

/// Parameters understood by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameters {
    /// How long the job works for.
    pub seconds: u64,
}

impl JobParameters {
    /// Parse typed parameters out of the raw invocation parameters.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidInput(format!("invalid job parameters: {}", e)))
    }
}

/// Body of a job submission.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub seconds: Option<serde_json::Number>,
}

impl JobRequest {
    pub fn from_body(body: &Value) -> Result<Self> {
        if !body.is_object() {
            return Err(Error::InvalidInput(
                "request body must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(body.clone())
            .map_err(|e| Error::InvalidInput(format!("invalid request body: {}", e)))
    }

    /// Check that `seconds` is present and is an integer of at least 1.
    pub fn validate(&self) -> Result<JobParameters> {
        let seconds = self
            .seconds
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("seconds is required".to_string()))?;

        match seconds.as_u64() {
            Some(seconds) if seconds >= 1 => Ok(JobParameters { seconds }),
            Some(_) => Err(Error::InvalidInput(
                "seconds must be greater than or equal to 1".to_string(),
            )),
            None if seconds.is_i64() => Err(Error::InvalidInput(
                "seconds must be greater than or equal to 1".to_string(),
            )),
            None => Err(Error::InvalidInput("seconds must be an integer".to_string())),
        }
    }
}
