//! Job wire contract.
//!
//! The job protocol has two exchanges:
//!
//! ```text
//!   POST /jobs  JobRequest ──→ "job-id"
//!   GET  /jobs?job_id=..&include_results=true ──→ [JobStatus]
//! ```
//!
//! A job reports `Running` until it is complete, then `Completed` with one
//! serialized histogram per submitted program, in submission order.

use serde::{Deserialize, Serialize};

/// Language tag sent by clients for QIR payloads.
pub const LANGUAGE_QIR_BITCODE: &str = "QIR_BITCODE";

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The ID as a string slice.
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

/// Job submission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Human-readable job name.
    pub name: String,
    /// Program language tag.
    pub language: String,
    /// Shot count for each program, parallel to `input_data`.
    pub shots: Vec<u32>,
    /// Target machine name.
    pub target: String,
    /// Base64-encoded programs.
    pub input_data: Vec<String>,
    /// Opaque backend settings; serialized as `null` when unset.
    #[serde(default)]
    pub backend_settings: Option<String>,
}

impl JobRequest {
    /// Number of programs in the job.
    pub fn num_programs(&self) -> usize {
        self.input_data.len()
    }

    /// Check that every program has a shot count.
    pub fn validate(&self) -> Result<(), String> {
        if self.shots.len() != self.input_data.len() {
            return Err(format!(
                "shots has {} entries but input_data has {}",
                self.shots.len(),
                self.input_data.len()
            ));
        }
        Ok(())
    }
}

/// Status of a job as reported by the job endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum JobStatus {
    /// Job is still executing.
    Running,
    /// Job finished; one serialized histogram per program.
    Completed { result: Vec<String> },
    /// Job failed on the provider side.
    Failed,
    /// Job was cancelled.
    Canceled,
    /// Job was deleted.
    Deleted,
    /// Job cancellation is in progress.
    Cancelling,
    /// Status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed { .. }
                | JobStatus::Failed
                | JobStatus::Canceled
                | JobStatus::Deleted
        )
    }

    /// Check if the job was cancelled or is being cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            JobStatus::Canceled | JobStatus::Deleted | JobStatus::Cancelling
        )
    }

    /// Short name used in logs and metrics labels.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Deleted => "deleted",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Completed { result } => write!(f, "Completed ({} results)", result.len()),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::Canceled => write!(f, "Canceled"),
            JobStatus::Deleted => write!(f, "Deleted"),
            JobStatus::Cancelling => write!(f, "Cancelling"),
            JobStatus::Unknown => write!(f, "Unknown"),
        }
    }
}
