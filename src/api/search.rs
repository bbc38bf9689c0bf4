//! Song search API
//!
//! GET /api/search?q= returns up to five candidate tracks from the
//! search collaborator.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::TrackCandidate;
use crate::services::SearchClient;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<TrackCandidate>,
}

/// GET /api/search?q=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    if params.q.trim().is_empty() {
        return Err(ApiError::BadRequest("search query is required".to_string()));
    }

    let client = SearchClient::new(state.http.clone());
    let results = client
        .search(params.q.trim())
        .await
        .map_err(|e| ApiError::Upstream(format!("search failed: {e}")))?;

    Ok(Json(SearchResponse { results }))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/search", get(search))
}
