//! drumless - drum-stem-removal web service
//!
//! Search for a song, submit a track, poll until the drums-removed
//! instrumental is ready. Single process, in-memory job state, one
//! detached pipeline task per job.

use anyhow::Result;
use tracing::info;

use drumless::config::Config;
use drumless::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting drumless v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve();
    info!(media_dir = %config.media_dir.display(), "media directory");
    if config.serverless {
        info!("serverless deployment: processing pipeline disabled");
    }
    config.log_strategies();

    tokio::fs::create_dir_all(&config.media_dir).await?;

    let bind = config.bind.clone();
    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{bind}");
    info!("Health check: http://{bind}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
