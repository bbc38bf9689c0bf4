//! Job lifecycle state machine
//!
//! A job progresses pending → downloading → processing → completed,
//! with failed reachable from any non-terminal state. Terminal states
//! never change again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, pipeline not yet started
    Pending,
    /// Acquiring source audio
    Downloading,
    /// Separation / remix in progress
    Processing,
    /// Output file ready for download
    Completed,
    /// Pipeline aborted, see `error`
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One user-initiated processing request, tracked in the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier, generated at submission
    pub id: Uuid,

    /// Current lifecycle state
    pub status: JobStatus,

    /// Display title supplied by the caller
    pub title: String,

    /// Advisory progress 0-100, meaningful while downloading/processing
    pub progress: Option<u8>,

    /// Retrieval path for the output; present iff status == Completed
    pub download_url: Option<String>,

    /// Failure message; present iff status == Failed
    pub error: Option<String>,

    /// Submission time
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: Uuid, title: String) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            title,
            progress: None,
            download_url: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Advance to a new non-terminal state. Transitions out of a terminal
    /// state are ignored so a late writer can never resurrect a job.
    pub fn advance(&mut self, status: JobStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
    }

    /// Record advisory progress, clamped to never decrease. The scraped
    /// signal is lossy and may arrive out of order.
    pub fn set_progress(&mut self, pct: u8) {
        if self.status.is_terminal() {
            return;
        }
        let pct = pct.min(100);
        match self.progress {
            Some(current) if current >= pct => {}
            _ => self.progress = Some(pct),
        }
    }

    /// Terminal success: progress pinned to 100, download URL recorded.
    pub fn complete(&mut self, download_url: String) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.progress = Some(100);
        self.download_url = Some(download_url);
        self.error = None;
    }

    /// Terminal failure: message recorded, download URL cleared.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.download_url = None;
    }
}

/// One search result, ephemeral (never stored).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackCandidate {
    /// Provider track/video identifier
    pub id: String,
    /// Track title
    pub title: String,
    /// Thumbnail image URL
    pub thumbnail: String,
    /// Display duration (e.g. "3:42")
    pub duration: String,
    /// Channel / uploader display name
    pub channel: String,
}

/// Derive a filesystem-safe basename fragment from a display title:
/// non-alphanumeric characters become `_`, truncated to 50 chars.
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(50)
        .collect()
}
