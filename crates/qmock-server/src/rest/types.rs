//! JSON request/response types for the job API.

use serde::{Deserialize, Serialize};

// ── Requests ──────────────────────────────────────────────────────────────

/// GET /jobs query string.
///
/// Both fields are required; they are optional here so a missing field is
/// reported with the server's own error body rather than axum's rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PollParams {
    pub job_id: Option<String>,
    pub include_results: Option<String>,
}

// ── Responses ─────────────────────────────────────────────────────────────

/// GET /health
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}
