//! drumless library interface
//!
//! A single-process web service: search for a song, submit a track for
//! processing, poll its job until the drums-removed instrumental is
//! ready for download. Job state lives in process memory only.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::JobStore;

/// Application state shared across handlers and pipeline tasks
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: Arc<Config>,
    /// Process-wide job store, the only shared mutable state
    pub store: JobStore,
    /// Shared HTTP client for search and download strategies
    pub http: reqwest::Client,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            store: JobStore::new(),
            http: reqwest::Client::new(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::job_routes())
        .merge(api::search_routes())
        .merge(api::download_routes())
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
