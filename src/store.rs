//! In-memory job store
//!
//! The only cross-task shared state in the process. Each job record is
//! written exclusively by the one pipeline task that owns its id; status
//! queries only read. Records are never deleted; they are bounded by
//! process lifetime, an accepted tradeoff for a low-volume tool.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Job, JobStatus};

/// Process-wide map from job id to job record.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh pending job with a generated id.
    pub async fn create(&self, title: String) -> Job {
        let mut jobs = self.jobs.write().await;
        // v4 collisions are not a practical concern, but never clobber
        // an existing record if one were to occur.
        let mut id = Uuid::new_v4();
        while jobs.contains_key(&id) {
            id = Uuid::new_v4();
        }
        let job = Job::new(id, title);
        jobs.insert(id, job.clone());
        job
    }

    /// Snapshot of the current record, if any.
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Full-record read-modify-write. Only the pipeline task owning `id`
    /// may call this, so there are no cross-task write races on a key.
    pub async fn update<F>(&self, id: Uuid, mutate: F)
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            mutate(job);
        } else {
            tracing::warn!(job_id = %id, "update for unknown job id ignored");
        }
    }

    /// Convenience: advance the job's status.
    pub async fn set_status(&self, id: Uuid, status: JobStatus) {
        self.update(id, |job| job.advance(status)).await;
    }

    /// Convenience: record advisory progress (monotonic clamp applied).
    pub async fn set_progress(&self, id: Uuid, pct: u8) {
        self.update(id, |job| job.set_progress(pct)).await;
    }

    /// Convenience: terminal failure.
    pub async fn fail(&self, id: Uuid, message: impl Into<String>) {
        self.update(id, |job| job.fail(message)).await;
    }

    /// Convenience: terminal success.
    pub async fn complete(&self, id: Uuid, download_url: String) {
        self.update(id, |job| job.complete(download_url)).await;
    }
}
