//! Error types for the job client.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur when talking to the job API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// No credentials source could be found.
    #[error("Cannot find credentials: set QMOCK_CREDENTIALS or create {}", .0.display())]
    MissingCredentials(PathBuf),

    /// Credentials file could not be read.
    #[error("Failed to read credentials file {}: {source}", path.display())]
    CredentialsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credentials file content is invalid.
    #[error("Ill-formed credentials file ({}): {message}", path.display())]
    InvalidCredentials { path: PathBuf, message: String },

    /// A job needs at least one kernel.
    #[error("Job must contain at least one kernel")]
    EmptyJob,

    /// Poll response did not contain a status entry.
    #[error("Empty poll response for job {0}")]
    EmptyResponse(String),

    /// Job execution failed on the server.
    #[error("Job failed to execute: {0}")]
    JobFailed(String),

    /// Job was cancelled or deleted.
    #[error("Job was cancelled: {0}")]
    JobCancelled(String),
}
