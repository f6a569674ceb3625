//! HTTP surface of the mock job server.
//!
//! ```text
//!   POST /jobs                                 submit, returns the job ID
//!   GET  /jobs?job_id=..&include_results=true  poll, returns [JobStatus]
//!   GET  /health
//!   GET  /metrics
//! ```

pub mod auth;
pub mod types;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use qmock_hal::{JobId, JobRequest, JobStatus};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::service::JobService;

use auth::AuthToken;
use types::{HealthResponse, PollParams};

// ── Shared application state ──────────────────────────────────────────────

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<JobService>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wrap a job service.
    pub fn new(service: JobService) -> Self {
        Self {
            service: Arc::new(service),
            metrics: Metrics::new(),
        }
    }
}

// ── Router construction ───────────────────────────────────────────────────

/// Build the Axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", get(poll_job_handler).post(submit_job_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Accept both a bare ID and the JSON-quoted form clients echo back.
fn normalize_job_id(raw: &str) -> JobId {
    let raw = raw.trim();
    serde_json::from_str::<String>(raw)
        .map(JobId::from)
        .unwrap_or_else(|_| JobId::new(raw))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidRequest(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn submit_job_handler(
    State(state): State<AppState>,
    token: AuthToken,
    body: std::result::Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<String>> {
    let Json(request) = body.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    let job_id = state.service.submit(request, Some(token.as_str())).await?;
    Ok(Json(job_id.0))
}

async fn poll_job_handler(
    State(state): State<AppState>,
    Query(params): Query<PollParams>,
) -> Result<Json<Vec<JobStatus>>> {
    let job_id = params
        .job_id
        .as_deref()
        .map(normalize_job_id)
        .ok_or_else(|| Error::InvalidRequest("missing query parameter 'job_id'".to_string()))?;
    let include_results = params
        .include_results
        .as_deref()
        .ok_or_else(|| {
            Error::InvalidRequest("missing query parameter 'include_results'".to_string())
        })
        .and_then(|v| parse_bool("include_results", v))?;

    let status = state.service.poll(&job_id, include_results).await?;
    Ok(Json(vec![status]))
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let body = state
        .metrics
        .export()
        .map_err(|e| Error::Internal(format!("failed to encode metrics: {e}")))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_job_id() {
        assert_eq!(normalize_job_id("abc-123").as_str(), "abc-123");
        assert_eq!(normalize_job_id("\"abc-123\"").as_str(), "abc-123");
        assert_eq!(normalize_job_id(" \"abc\" ").as_str(), "abc");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("x", "true").unwrap());
        assert!(parse_bool("x", "True").unwrap());
        assert!(parse_bool("x", "1").unwrap());
        assert!(!parse_bool("x", "false").unwrap());
        assert!(!parse_bool("x", "0").unwrap());
        assert!(matches!(
            parse_bool("x", "maybe"),
            Err(Error::InvalidRequest(_))
        ));
    }
}
