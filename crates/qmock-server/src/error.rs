//! Error types for the job server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use qmock_hal::EngineError;
use qmock_qir::ParseError;
use thiserror::Error;

use crate::rest::types::ErrorResponse;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving jobs.
#[derive(Debug, Error)]
pub enum Error {
    /// No credentials were presented.
    #[error("Credentials not provided")]
    Unauthenticated,

    /// Request is structurally invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Program payload could not be decoded.
    #[error("Malformed program: {0}")]
    MalformedProgram(String),

    /// Module contains no function with a body.
    #[error("Could not find kernel function")]
    NoKernelFound,

    /// Execution engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Request asks for a mode the server does not implement.
    #[error("Unsupported option: {0}")]
    UnsupportedOption(String),

    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::InvalidRequest(_)
            | Error::MalformedProgram(_)
            | Error::NoKernelFound
            | Error::UnsupportedOption(_) => StatusCode::BAD_REQUEST,
            Error::Engine(e) if e.is_program_error() => StatusCode::BAD_REQUEST,
            Error::JobNotFound(_) => StatusCode::NOT_FOUND,
            Error::Engine(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::InvalidRequest(_) => "invalid_request",
            Error::MalformedProgram(_) => "malformed_program",
            Error::NoKernelFound => "no_kernel",
            Error::Engine(_) => "engine",
            Error::UnsupportedOption(_) => "unsupported_option",
            Error::JobNotFound(_) => "not_found",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::MalformedProgram(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NoKernelFound.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::JobNotFound("id".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_engine_errors_split_by_cause() {
        let program = Error::Engine(EngineError::TooManyQubits {
            requested: 30,
            max: 20,
        });
        assert_eq!(program.status_code(), StatusCode::BAD_REQUEST);

        let engine = Error::Engine(EngineError::Execution("crashed".into()));
        assert_eq!(engine.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_parse_error_is_malformed_program() {
        let err: Error = ParseError::Bitcode.into();
        assert!(matches!(err, Error::MalformedProgram(_)));
    }
}
