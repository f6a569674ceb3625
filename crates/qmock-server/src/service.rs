//! Job lifecycle: submission, execution and polling.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use qmock_hal::{JobId, JobRequest, JobStatus};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::ProgramExecutor;
use crate::job_store::{JobStore, StoredJob};
use crate::metrics::Metrics;

/// Process-wide poll latch.
///
/// Shared across all jobs and clients: the first `threshold` polls after a
/// reset report `Running`, the next one reports completion and resets it.
#[derive(Debug)]
pub struct PollCounter {
    count: Mutex<u32>,
    threshold: u32,
}

impl PollCounter {
    /// Create a counter that completes every `threshold + 1`-th poll.
    pub fn new(threshold: u32) -> Self {
        Self {
            count: Mutex::new(0),
            threshold,
        }
    }

    /// Register a poll. Returns `true` when this poll completes.
    pub fn tick(&self) -> bool {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *count < self.threshold {
            *count += 1;
            false
        } else {
            *count = 0;
            true
        }
    }

    /// Polls registered since the last completion.
    pub fn current(&self) -> u32 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Submit/poll service behind the HTTP routes.
pub struct JobService {
    executor: ProgramExecutor,
    store: Arc<JobStore>,
    polls: PollCounter,
    metrics: Metrics,
}

impl JobService {
    /// Create a service around an executor.
    pub fn new(executor: ProgramExecutor, poll_threshold: u32) -> Self {
        Self {
            executor,
            store: Arc::new(JobStore::new()),
            polls: PollCounter::new(poll_threshold),
            metrics: Metrics::new(),
        }
    }

    /// Build the simulator-backed service described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ProgramExecutor::simulator(&config.executor),
            config.jobs.poll_threshold,
        )
    }

    /// The job store.
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Accept a job, run all of its programs and store the results.
    ///
    /// Programs execute before the ID is returned, so a stored job is always
    /// complete.
    #[instrument(skip(self, request, token), fields(name = %request.name, programs = request.num_programs()))]
    pub async fn submit(&self, request: JobRequest, token: Option<&str>) -> Result<JobId> {
        if token.is_none_or(|t| t.trim().is_empty()) {
            return Err(Error::Unauthenticated);
        }
        request.validate().map_err(Error::InvalidRequest)?;

        let executor = self.executor.clone();
        let programs = request.input_data.clone();
        let shots = request.shots.clone();
        let results = tokio::task::spawn_blocking(move || executor.execute_all(&programs, &shots))
            .await
            .map_err(|e| Error::Internal(format!("execution task failed: {e}")))??;

        let id = JobId::new(Uuid::new_v4().to_string());
        info!(job_id = %id, target = %request.target, "Storing completed job");
        let stored = self
            .store
            .insert(StoredJob {
                id: id.clone(),
                name: request.name,
                target: request.target,
                shots: request.shots,
                results,
                submitted_at: Utc::now(),
            })
            .await;

        self.metrics.record_job_submitted(stored);
        Ok(id)
    }

    /// Answer a poll for `job_id`.
    ///
    /// The answer depends only on the shared latch; the ID is looked up only
    /// on the completing poll.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn poll(&self, job_id: &JobId, include_results: bool) -> Result<JobStatus> {
        if !include_results {
            return Err(Error::UnsupportedOption(
                "include_results=false is not supported".to_string(),
            ));
        }

        let status = if self.polls.tick() {
            let job = self.store.get(job_id).await?;
            JobStatus::Completed {
                result: job.results,
            }
        } else {
            JobStatus::Running
        };

        debug!(status = status.label(), "Poll answered");
        self.metrics.record_poll(status.label());
        Ok(status)
    }
}
