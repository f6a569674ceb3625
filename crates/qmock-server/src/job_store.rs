//! In-memory job storage.
//!
//! Jobs are created once with all results computed and are never mutated or
//! evicted; they live until the process exits.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use qmock_hal::JobId;

use crate::error::{Error, Result};

/// A completed job as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredJob {
    pub id: JobId,
    pub name: String,
    pub target: String,
    pub shots: Vec<u32>,
    /// One serialized histogram per program, in submission order.
    pub results: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Thread-safe job store.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<FxHashMap<String, StoredJob>>,
}

impl JobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a job, returning the number of jobs held afterwards.
    pub async fn insert(&self, job: StoredJob) -> usize {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.0.clone(), job);
        jobs.len()
    }

    /// Get a job by ID.
    pub async fn get(&self, job_id: &JobId) -> Result<StoredJob> {
        self.jobs
            .read()
            .await
            .get(&job_id.0)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(job_id.0.clone()))
    }

    /// Check whether a job exists.
    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.read().await.contains_key(&job_id.0)
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Check whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> StoredJob {
        StoredJob {
            id: JobId::new(id),
            name: "bell".to_string(),
            target: "QVLS-Q1".to_string(),
            shots: vec![10],
            results: vec![r#"{"00":10}"#.to_string()],
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = JobStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.insert(job("a")).await, 1);

        let stored = store.get(&JobId::new("a")).await.unwrap();
        assert_eq!(stored.results, vec![r#"{"00":10}"#.to_string()]);
        assert!(stored.submitted_at <= Utc::now());
        assert!(store.contains(&JobId::new("a")).await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_job_not_found() {
        let store = JobStore::new();
        let result = store.get(&JobId::new("nonexistent")).await;
        assert!(matches!(result, Err(Error::JobNotFound(_))));
        assert!(!store.contains(&JobId::new("nonexistent")).await);
    }
}
