//! Output retrieval API
//!
//! GET /api/download/:file streams the finished output. Only the base
//! filename component of the supplied reference is ever used, so a
//! traversal attempt resolves harmlessly inside the media directory.

use axum::{
    extract::{Path as AxumPath, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/download/:file
pub async fn download(
    State(state): State<AppState>,
    AxumPath(file): AxumPath<String>,
) -> ApiResult<Response> {
    // Path-traversal defense: reduce the reference to its base filename.
    let safe_name = std::path::Path::new(&file)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .filter(|n| n != "." && n != "..")
        .ok_or_else(|| ApiError::BadRequest("invalid file reference".to_string()))?;

    let path = state.config.media_dir.join(&safe_name);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!("File not found: {safe_name}")));
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("could not read output file: {e}")))?;
    tracing::debug!(file = %safe_name, bytes = bytes.len(), "serving output file");

    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{safe_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new().route("/api/download/:file", get(download))
}
