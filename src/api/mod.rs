//! HTTP API handlers for drumless

pub mod download;
pub mod health;
pub mod jobs;
pub mod search;
pub mod ui;

pub use download::download_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use search::search_routes;
pub use ui::ui_routes;
