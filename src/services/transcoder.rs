//! ffmpeg transcoding adapter
//!
//! Two duties: re-encode an acquired source into WAV when the separation
//! tool needs a canonical input, and mix the final stem down to MP3. Both
//! are bounded subprocess invocations with distinguishable failures.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::services::output_tail;

/// Transcode runs are short compared to separation; two minutes covers
/// any reasonable track length.
const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("could not spawn transcoder: {0}")]
    Spawn(String),

    #[error("transcoder exited with {code}: {tail}")]
    ToolFailed { code: String, tail: String },

    #[error("transcode timed out after {0:?}")]
    Timeout(Duration),

    #[error("transcoder exited successfully but produced no file")]
    NoOutput,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FfmpegTranscoder<'a> {
    config: &'a Config,
}

impl<'a> FfmpegTranscoder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Encode `input` (typically the WAV stem) to MP3 at the configured
    /// bitrate.
    pub async fn encode_mp3(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        debug!(input = %input.display(), output = %output.display(), "encoding MP3");
        self.run(&[
            "-i".as_ref(),
            input.as_os_str(),
            "-codec:a".as_ref(),
            "libmp3lame".as_ref(),
            "-b:a".as_ref(),
            self.config.output_bitrate.as_ref(),
            "-y".as_ref(),
            output.as_os_str(),
        ])
        .await?;
        if !output.exists() {
            return Err(TranscodeError::NoOutput);
        }
        Ok(())
    }

    /// Re-encode an arbitrary acquired container into 44.1 kHz stereo WAV
    /// for the separation tool.
    pub async fn normalize_to_wav(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        debug!(input = %input.display(), output = %output.display(), "normalizing to WAV");
        self.run(&[
            "-i".as_ref(),
            input.as_os_str(),
            "-ar".as_ref(),
            "44100".as_ref(),
            "-ac".as_ref(),
            "2".as_ref(),
            "-y".as_ref(),
            output.as_os_str(),
        ])
        .await?;
        if !output.exists() {
            return Err(TranscodeError::NoOutput);
        }
        Ok(())
    }

    async fn run(&self, args: &[&std::ffi::OsStr]) -> Result<(), TranscodeError> {
        let child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscodeError::Spawn(e.to_string()))?;

        let output = tokio::time::timeout(TRANSCODE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| TranscodeError::Timeout(TRANSCODE_TIMEOUT))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::ToolFailed {
                code: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                tail: output_tail(&stderr, 10),
            });
        }
        Ok(())
    }
}
