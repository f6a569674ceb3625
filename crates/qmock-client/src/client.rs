//! HTTP client for the job API.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use qmock_hal::{Counts, JobId, JobRequest, JobStatus, LANGUAGE_QIR_BITCODE};

use crate::credentials::Credentials;
use crate::error::{ClientError, ClientResult};

/// Default job API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.qudora.com/jobs/";

/// Default target machine.
pub const DEFAULT_MACHINE: &str = "QVLS-Q1";

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Jobs endpoint, always ending in `/`.
    pub base_url: String,
    pub machine: String,
    /// Credentials file used when `QMOCK_CREDENTIALS` is unset.
    pub credentials: Option<PathBuf>,
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            machine: DEFAULT_MACHINE.to_string(),
            credentials: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Point the client at another endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(url.into());
        self
    }

    /// Target another machine.
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = machine.into();
        self
    }

    /// Read credentials from this file.
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    /// Change the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn normalize_base_url(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// A compiled kernel ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelCode {
    pub name: String,
    /// Base64-encoded program.
    pub code: String,
}

impl KernelCode {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Job API client.
pub struct QmockClient {
    client: Client,
    config: ClientConfig,
    credentials: Credentials,
}

impl std::fmt::Debug for QmockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QmockClient")
            .field("base_url", &self.config.base_url)
            .field("machine", &self.config.machine)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl QmockClient {
    /// Create a client, discovering credentials.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let credentials = Credentials::discover(config.credentials.as_deref())?;
        Self::with_credentials(config, credentials)
    }

    /// Create a client with explicit credentials.
    pub fn with_credentials(config: ClientConfig, credentials: Credentials) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let config = ClientConfig {
            base_url: normalize_base_url(config.base_url),
            ..config
        };

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// The client settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.credentials.key)
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response.text().await.unwrap_or_default();
        Err(ClientError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    /// Build the submission payload for `kernels`, each run `shots` times.
    pub fn create_job(&self, kernels: &[KernelCode], shots: u32) -> ClientResult<JobRequest> {
        let first = kernels.first().ok_or(ClientError::EmptyJob)?;
        debug!(kernels = kernels.len(), machine = %self.config.machine, "Creating job payload");

        Ok(JobRequest {
            name: format!("CUDA-Q {}", first.name),
            language: LANGUAGE_QIR_BITCODE.to_string(),
            shots: vec![shots; kernels.len()],
            target: self.config.machine.clone(),
            input_data: kernels.iter().map(|k| k.code.clone()).collect(),
            backend_settings: None,
        })
    }

    /// Submit a job and return its ID.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn submit(&self, request: &JobRequest) -> ClientResult<JobId> {
        debug!("POST {}", self.config.base_url);
        let response = self
            .client
            .post(&self.config.base_url)
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::ACCEPT, "*/*")
            .json(request)
            .send()
            .await?;

        let id: String = Self::handle_response(response).await?;
        info!(job_id = %id, "Job submitted");
        Ok(JobId::new(id))
    }

    /// Poll URL for a job.
    pub fn job_path(&self, job_id: &JobId) -> String {
        format!(
            "{}?job_id={}&include_results=True",
            self.config.base_url, job_id
        )
    }

    /// Fetch the current status of a job.
    #[instrument(skip(self))]
    pub async fn poll(&self, job_id: &JobId) -> ClientResult<JobStatus> {
        let url = self.job_path(job_id);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::ACCEPT, "*/*")
            .send()
            .await?;

        let statuses: Vec<JobStatus> = Self::handle_response(response).await?;
        statuses
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::EmptyResponse(job_id.to_string()))
    }

    /// Whether a polled status is final. Failure and cancellation are errors.
    pub fn is_done(job_id: &JobId, status: &JobStatus) -> ClientResult<bool> {
        match status {
            JobStatus::Completed { .. } => Ok(true),
            JobStatus::Failed => Err(ClientError::JobFailed(job_id.to_string())),
            s if s.is_cancelled() => Err(ClientError::JobCancelled(job_id.to_string())),
            _ => Ok(false),
        }
    }

    /// Poll until the job completes and return its raw results.
    #[instrument(skip(self))]
    pub async fn wait(&self, job_id: &JobId) -> ClientResult<Vec<String>> {
        loop {
            let status = self.poll(job_id).await?;
            if Self::is_done(job_id, &status)? {
                if let JobStatus::Completed { result } = status {
                    return Ok(result);
                }
            }
            debug!(status = status.label(), "Job not done yet");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Decode per-program histograms.
    pub fn process_results(results: &[String]) -> ClientResult<Vec<Counts>> {
        results
            .iter()
            .map(|r| Counts::from_json(r).map_err(ClientError::from))
            .collect()
    }

    /// Submit kernels, wait for completion and return one histogram per kernel.
    pub async fn run(&self, kernels: &[KernelCode], shots: u32) -> ClientResult<Vec<Counts>> {
        let request = self.create_job(kernels, shots)?;
        let job_id = self.submit(&request).await?;
        let results = self.wait(&job_id).await?;
        Self::process_results(&results)
    }
}
