//! Job record types.
//!
//! A job has two identities:
//!
//! - [`JobId`]: the externally exposed correlation id, used as the lookup key.
//! - [`RunId`]: the execution backend's own run identifier, used for cancellation.
//!
//! The status state machine is driven entirely by the execution backend:
//!
//! ```text
//!   PENDING ──→ RUNNING ──→ SUCCESS
//!      │           │
//!      │           ├──→ FAILURE
//!      │           │
//!      └───────────┴──→ CANCELLING ──→ CANCELLED
//! ```
//!
//! **Invariants:**
//! - `SUCCESS`, `FAILURE` and `CANCELLED` are terminal.
//! - `CANCELLING` is in flight and cannot be cancelled again.
//! - This crate never writes a status; it only requests cancellation.

use serde::{Deserialize, Serialize};

/// Externally exposed job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Run identifier assigned by the execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a job as reported by the execution backend.
///
/// Serialized as the raw upper-case token stored in the job table. Tokens
/// outside the known set are kept verbatim in [`JobStatus::Other`] and are
/// treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Job is accepted but not yet running.
    Pending,
    /// Job is currently running.
    Running,
    /// Job completed successfully.
    Success,
    /// Job failed.
    Failure,
    /// Cancellation was requested and is in flight.
    Cancelling,
    /// Job was cancelled.
    Cancelled,
    /// A status token this service does not recognize.
    Other(String),
}

impl JobStatus {
    /// Returns the wire token for this status.
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
            JobStatus::Cancelling => "CANCELLING",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Other(raw) => raw,
        }
    }

    /// Check if the job finished on its own, successfully or not.
    pub fn is_completed(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }

    /// Check if a cancellation was already requested or has taken effect.
    pub fn is_cancel_requested(&self) -> bool {
        matches!(self, JobStatus::Cancelling | JobStatus::Cancelled)
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "PENDING" => JobStatus::Pending,
            "RUNNING" => JobStatus::Running,
            "SUCCESS" => JobStatus::Success,
            "FAILURE" => JobStatus::Failure,
            "CANCELLING" => JobStatus::Cancelling,
            "CANCELLED" => JobStatus::Cancelled,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        JobStatus::from(s.as_str())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted metadata for one submitted query-execution job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub run_id: RunId,
    pub status: JobStatus,
    /// Request that originally submitted the job.
    pub request_id: String,
    pub query: String,
    /// Output location for the query results.
    pub destination: String,
    /// Credential claim captured at submission time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_claim: Option<String>,
}
