//! Mock QPU cloud job server.
//!
//! Accepts base64-encoded QIR programs over HTTP, runs them on the local
//! statevector simulator at submission time, and serves the stored histograms
//! through a poll endpoint gated by a process-wide latch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       qmock-server                           │
//! │                                                              │
//! │  rest (axum router)  ──→  JobService  ──→  ProgramExecutor   │
//! │                            │   │              │              │
//! │                   PollCounter  JobStore   ExecutionEngine    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use qmock_server::{AppState, Config, JobService, router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = router(AppState::new(JobService::from_config(&config)));
//!     let listener = tokio::net::TcpListener::bind(config.address()?).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod job_store;
pub mod metrics;
pub mod rest;
pub mod service;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use executor::ProgramExecutor;
pub use job_store::{JobStore, StoredJob};
pub use metrics::Metrics;
pub use rest::{AppState, router};
pub use service::{JobService, PollCounter};
pub use telemetry::{LogFormat, Telemetry};
