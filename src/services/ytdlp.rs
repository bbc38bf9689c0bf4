//! yt-dlp CLI strategy
//!
//! Second strategy in the acquisition chain. Gated behind an explicit
//! opt-in flag: the external binary fetches arbitrary content, so it is
//! never used silently. Absence of the opt-in reports `NotConfigured`,
//! which by itself is not a pipeline error.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::services::acquisition::{watch_url, AcquireError};
use crate::services::output_tail;

pub struct YtDlpClient<'a> {
    config: &'a Config,
}

impl<'a> YtDlpClient<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Download and extract audio for a track id to `dest` (mp3).
    pub async fn fetch(&self, track_id: &str, dest: &Path) -> Result<(), AcquireError> {
        if !self.config.enable_ytdlp {
            return Err(AcquireError::NotConfigured);
        }

        let url = watch_url(track_id);
        debug!(track_id, program = %self.config.ytdlp_path, "invoking yt-dlp");

        let mut command = Command::new(&self.config.ytdlp_path);
        command
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("0")
            .arg("-o")
            .arg(dest)
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| AcquireError::Request(format!("could not spawn yt-dlp: {e}")))?;

        let output = tokio::time::timeout(self.config.download_timeout, child.wait_with_output())
            .await
            .map_err(|_| AcquireError::Timeout(self.config.download_timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquireError::ToolFailed {
                code: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                tail: output_tail(&stderr, 10),
            });
        }

        if !dest.exists() {
            return Err(AcquireError::BadResponse(
                "yt-dlp exited successfully but produced no file".to_string(),
            ));
        }
        Ok(())
    }
}
