//! Data models for drumless
//!
//! Job lifecycle state machine and ephemeral search results.

pub mod job;

pub use job::{safe_title, Job, JobStatus, TrackCandidate};
