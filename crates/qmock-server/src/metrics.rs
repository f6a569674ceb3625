//! Prometheus metrics for the job server.
//!
//! - Jobs submitted
//! - Programs executed, by outcome, and their execution time
//! - Polls answered, by reported status
//! - Jobs held in the store

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, IntCounter, TextEncoder, register_counter_vec,
    register_gauge, register_histogram, register_int_counter,
};

lazy_static! {
    /// Counter for accepted job submissions
    pub static ref JOBS_SUBMITTED: IntCounter = register_int_counter!(
        "qmock_jobs_submitted_total",
        "Total number of jobs accepted"
    )
    .unwrap();

    /// Counter for executed programs, labeled by outcome
    pub static ref PROGRAMS_EXECUTED: CounterVec = register_counter_vec!(
        "qmock_programs_executed_total",
        "Total number of programs executed",
        &["outcome"]
    )
    .unwrap();

    /// Histogram for program execution time in milliseconds
    pub static ref PROGRAM_DURATION: Histogram = register_histogram!(
        "qmock_program_duration_milliseconds",
        "Program decode and execution time in milliseconds",
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap();

    /// Counter for polls, labeled by the status reported
    pub static ref JOB_POLLS: CounterVec = register_counter_vec!(
        "qmock_job_polls_total",
        "Total number of job status polls",
        &["status"]
    )
    .unwrap();

    /// Gauge for jobs held in memory
    pub static ref STORED_JOBS: Gauge = register_gauge!(
        "qmock_stored_jobs",
        "Number of jobs held in the job store"
    )
    .unwrap();
}

/// Metrics recorder.
///
/// The metrics themselves are process-wide statics (`lazy_static`).
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    /// Create a new Metrics instance.
    pub fn new() -> Self {
        Self
    }

    /// Record an accepted job.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_job_submitted(&self, stored_jobs: usize) {
        JOBS_SUBMITTED.inc();
        STORED_JOBS.set(stored_jobs as f64);
    }

    /// Record one program execution.
    pub fn record_program(&self, outcome: &str, duration_ms: f64) {
        PROGRAMS_EXECUTED.with_label_values(&[outcome]).inc();
        PROGRAM_DURATION.observe(duration_ms);
    }

    /// Record a poll answer.
    pub fn record_poll(&self, status: &str) {
        JOB_POLLS.with_label_values(&[status]).inc();
    }

    /// Get current metrics as Prometheus text format.
    pub fn export(&self) -> Result<String, std::fmt::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|_| std::fmt::Error)?;

        String::from_utf8(buffer).map_err(|_| std::fmt::Error)
    }
}
