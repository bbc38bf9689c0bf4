//! Ordered acquisition fallback chain
//!
//! Strategies are tried in a fixed priority order (hosted download API,
//! then the yt-dlp CLI with explicit opt-in only, then the self-hosted
//! proxy), stopping at the first one that yields a file passing the media
//! sniff. When every configured strategy fails, the reasons are
//! aggregated strategy by strategy so the job's error explains exactly
//! what was attempted.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::services::hosted_api::HostedApiClient;
use crate::services::media::{self, MediaError};
use crate::services::proxy::ProxyClient;
use crate::services::ytdlp::YtDlpClient;

/// One strategy's failure reason. Variants are distinguishable so the
/// aggregate error names the precise failure mode of each attempt.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("credential not configured")]
    MissingCredential,

    #[error("not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("response lacked a usable media link: {0}")]
    BadResponse(String),

    #[error("served non-media content type {0:?}")]
    NotMediaContentType(String),

    #[error("payload failed media sniff: {0}")]
    NotMedia(#[from] MediaError),

    #[error("tool exited with {code}: {tail}")]
    ToolFailed { code: String, tail: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AcquireError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AcquireError::Request(format!("request timed out: {e}"))
        } else {
            AcquireError::Request(e.to_string())
        }
    }
}

/// Canonical watch URL for a track id, consumed by yt-dlp and the proxy.
pub fn watch_url(track_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={track_id}")
}

/// Try every configured strategy in priority order, writing the source
/// audio to `dest`. Each produced file must pass the media sniff before
/// the strategy counts as successful; a file that sniffs as an HTML or
/// JSON error body fails that strategy and the chain moves on.
///
/// Returns the aggregated failure report when nothing succeeds.
pub async fn acquire(
    config: &Config,
    http: &reqwest::Client,
    track_id: &str,
    dest: &Path,
) -> Result<(), String> {
    let mut attempts: Vec<(&'static str, AcquireError)> = Vec::new();

    let hosted = HostedApiClient::new(config, http);
    match hosted.fetch(track_id, dest).await {
        Ok(()) => match verify(dest) {
            Ok(()) => {
                info!(track_id, strategy = "hosted API", "source audio acquired");
                return Ok(());
            }
            Err(e) => attempts.push(("hosted API", e)),
        },
        Err(e) => attempts.push(("hosted API", e)),
    }
    discard_partial(dest);

    let ytdlp = YtDlpClient::new(config);
    match ytdlp.fetch(track_id, dest).await {
        Ok(()) => match verify(dest) {
            Ok(()) => {
                info!(track_id, strategy = "yt-dlp", "source audio acquired");
                return Ok(());
            }
            Err(e) => attempts.push(("yt-dlp", e)),
        },
        Err(e) => attempts.push(("yt-dlp", e)),
    }
    discard_partial(dest);

    let proxy = ProxyClient::new(config, http);
    match proxy.fetch(track_id, dest).await {
        Ok(()) => match verify(dest) {
            Ok(()) => {
                info!(track_id, strategy = "proxy", "source audio acquired");
                return Ok(());
            }
            Err(e) => attempts.push(("proxy", e)),
        },
        Err(e) => attempts.push(("proxy", e)),
    }
    discard_partial(dest);

    let all_unconfigured = attempts.iter().all(|(_, e)| {
        matches!(
            e,
            AcquireError::NotConfigured | AcquireError::MissingCredential
        )
    });
    let mut report = String::from(if all_unconfigured {
        "no working acquisition strategy is configured"
    } else {
        "all acquisition strategies failed"
    });
    for (name, err) in &attempts {
        report.push_str(&format!("; {name}: {err}"));
    }
    warn!(track_id, "{report}");
    Err(report)
}

fn verify(dest: &Path) -> Result<(), AcquireError> {
    media::check_media_file(dest)?;
    Ok(())
}

/// A failed attempt may leave a partial or garbage file behind; remove it
/// so the next strategy starts clean.
fn discard_partial(dest: &Path) {
    if dest.exists() {
        if let Err(e) = std::fs::remove_file(dest) {
            warn!(path = %dest.display(), error = %e, "could not remove partial download");
        }
    }
}

/// Stream an HTTP response body to `dest`. Shared by the hosted-API and
/// proxy strategies.
pub(crate) async fn save_body(
    response: reqwest::Response,
    dest: &Path,
) -> Result<(), AcquireError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AcquireError::Request(e.to_string()))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nothing_configured_yields_named_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path().to_path_buf());
        let http = reqwest::Client::new();
        let dest = dir.path().join("input.mp3");

        let err = acquire(&config, &http, "abc123", &dest)
            .await
            .expect_err("no strategy is configured");

        assert!(err.contains("no working acquisition strategy"), "{err}");
        assert!(err.contains("hosted API"), "{err}");
        assert!(err.contains("yt-dlp"), "{err}");
        assert!(err.contains("proxy"), "{err}");
        assert!(!dest.exists(), "no partial file may remain");
    }

    #[test]
    fn watch_url_embeds_track_id() {
        assert_eq!(
            watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
