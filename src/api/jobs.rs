//! Job submission and status API
//!
//! POST /api/process starts a job and returns its id immediately; the
//! pipeline runs as a detached task. GET /api/status/:job_id answers
//! polls against the job store.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::JobStatus;
use crate::services::pipeline;
use crate::AppState;

/// POST /api/process request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub track_id: String,
    #[serde(default)]
    pub title: String,
}

/// POST /api/process response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub job_id: Uuid,
    pub message: String,
}

/// GET /api/status/:job_id response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: JobStatus,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/process
///
/// Validates the request, records a pending job, spawns the pipeline and
/// returns before it completes (fire-and-forget).
pub async fn start_process(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    if request.track_id.trim().is_empty() {
        return Err(ApiError::BadRequest("trackId is required".to_string()));
    }
    if !state.config.processing_enabled() {
        return Err(ApiError::Unavailable(
            "processing pipeline is disabled in this deployment".to_string(),
        ));
    }

    let title = if request.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        request.title
    };
    let job = state.store.create(title).await;

    tracing::info!(
        job_id = %job.id,
        track_id = %request.track_id,
        title = %job.title,
        "job submitted"
    );

    // The pipeline task supervises itself: any failure inside it is
    // written into the job record, never propagated here.
    let task_state = state.clone();
    let job_id = job.id;
    let track_id = request.track_id;
    tokio::spawn(async move {
        pipeline::run_job(task_state, job_id, track_id).await;
    });

    Ok(Json(ProcessResponse {
        job_id: job.id,
        message: "Processing started".to_string(),
    }))
}

/// GET /api/status/:job_id
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    let job = state
        .store
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {job_id}")))?;

    tracing::debug!(job_id = %job_id, status = ?job.status, "status query");

    Ok(Json(StatusResponse {
        status: job.status,
        title: job.title,
        progress: job.progress,
        download_url: job.download_url,
        error: job.error,
    }))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/process", post(start_process))
        .route("/api/status/:job_id", get(get_status))
}
