//! Per-job pipeline orchestration
//!
//! Drives one job through downloading → processing → completed/failed:
//! acquire source audio with fallbacks, validate it, optionally normalize
//! for the separation tool, separate, remix to the final output, clean up
//! intermediates. Runs as a detached task; every failure is captured into
//! the job record and never escapes to the process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::JobStatus;
use crate::services::media::{self, MediaError};
use crate::services::separator::{DemucsSeparator, SeparationError};
use crate::services::transcoder::{FfmpegTranscoder, TranscodeError};
use crate::services::acquisition;
use crate::AppState;

/// A job's terminal failure reason. The variants mirror the error
/// taxonomy surfaced to the user: acquisition, payload validation, tool
/// failure, output locating, and the overall time bound.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Acquisition(String),

    #[error("acquired payload rejected: {0}")]
    Media(#[from] MediaError),

    #[error("normalization failed: {0}")]
    Normalize(TranscodeError),

    #[error(transparent)]
    Separation(#[from] SeparationError),

    #[error("job exceeded the overall time budget of {0:?}")]
    JobTimeout(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Entry point for the detached per-job task. Owns the job record for
/// the whole run; on any error the record transitions to failed and the
/// partial input is discarded best-effort.
pub async fn run_job(state: AppState, job_id: Uuid, track_id: String) {
    let input = state
        .config
        .media_dir
        .join(format!("{job_id}_input.mp3"));

    let outcome = match tokio::time::timeout(
        state.config.job_timeout,
        execute(&state, job_id, &track_id, &input),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => Err(PipelineError::JobTimeout(state.config.job_timeout)),
    };

    match outcome {
        Ok(download_url) => {
            info!(job_id = %job_id, url = %download_url, "job completed");
            state.store.complete(job_id, download_url).await;
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "job failed");
            remove_quietly(&input);
            state.store.fail(job_id, e.to_string()).await;
        }
    }
}

/// The pipeline body. Returns the download URL of the final output.
async fn execute(
    state: &AppState,
    job_id: Uuid,
    track_id: &str,
    input: &Path,
) -> Result<String, PipelineError> {
    let config: &crate::config::Config = &state.config;
    tokio::fs::create_dir_all(&config.media_dir).await?;

    // Step 1-3: acquire and validate source audio.
    state.store.set_status(job_id, JobStatus::Downloading).await;
    acquisition::acquire(config, &state.http, track_id, input)
        .await
        .map_err(PipelineError::Acquisition)?;
    let kind = media::check_media_file(input)?;
    debug!(job_id = %job_id, kind = ?kind, "source audio validated");

    // Step 4: normalize containers the separation tool handles poorly.
    let mut normalized: Option<PathBuf> = None;
    let separation_input = if kind.needs_normalization() {
        let wav = config.media_dir.join(format!("{job_id}_input.wav"));
        FfmpegTranscoder::new(config)
            .normalize_to_wav(input, &wav)
            .await
            .map_err(PipelineError::Normalize)?;
        normalized = Some(wav.clone());
        wav
    } else {
        input.to_path_buf()
    };

    // Step 5-7: separate, relaying scraped progress into the store.
    state.store.set_status(job_id, JobStatus::Processing).await;
    state.store.set_progress(job_id, 0).await;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let progress_store = state.store.clone();
    let pump = tokio::spawn(async move {
        while let Some(pct) = progress_rx.recv().await {
            progress_store.set_progress(job_id, pct).await;
        }
    });

    let stem = DemucsSeparator::new(config)
        .separate(&separation_input, progress_tx)
        .await?;
    let _ = pump.await;

    // Step 8: produce the final output. The served filename carries a
    // filesystem-safe slug of the title for a friendlier download name.
    let slug = state
        .store
        .get(job_id)
        .await
        .map(|job| crate::models::safe_title(&job.title))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "track".to_string());
    let filename = produce_output(config, job_id, &slug, &stem).await?;

    // Step 9: delete intermediates; never fatal, never masks an earlier
    // error (there is none by this point).
    cleanup_intermediates(config, input, normalized.as_deref(), &separation_input);

    // Step 10 happens in run_job (terminal transition).
    Ok(format!("/api/download/{filename}"))
}

/// Mix/encode the located stem into the served output file, returning its
/// base filename. An MP3 stem passes through; a WAV stem is encoded to
/// MP3, falling back to the raw WAV when the transcoder fails; with a
/// two-stem separation the single stem is already the full mix.
async fn produce_output(
    config: &crate::config::Config,
    job_id: Uuid,
    slug: &str,
    stem: &Path,
) -> Result<String, PipelineError> {
    let is_mp3 = stem
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false);

    if is_mp3 {
        let filename = format!("{job_id}_{slug}_no_drums.mp3");
        tokio::fs::copy(stem, config.media_dir.join(&filename)).await?;
        return Ok(filename);
    }

    let mp3_name = format!("{job_id}_{slug}_no_drums.mp3");
    let mp3_path = config.media_dir.join(&mp3_name);
    match FfmpegTranscoder::new(config).encode_mp3(stem, &mp3_path).await {
        Ok(()) => Ok(mp3_name),
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "MP3 encode failed, serving raw WAV stem");
            let wav_name = format!("{job_id}_{slug}_no_drums.wav");
            tokio::fs::copy(stem, config.media_dir.join(&wav_name)).await?;
            Ok(wav_name)
        }
    }
}

/// Best-effort removal of the input, the normalized copy, and the
/// separation tool's per-track output directory.
fn cleanup_intermediates(
    config: &crate::config::Config,
    input: &Path,
    normalized: Option<&Path>,
    separation_input: &Path,
) {
    remove_quietly(input);
    if let Some(wav) = normalized {
        remove_quietly(wav);
    }

    if let Some(basename) = separation_input.file_stem().map(|s| s.to_owned()) {
        let out_dir = config.separated_dir();
        let mut models = vec![config.demucs_model.clone()];
        for fallback in ["htdemucs", "htdemucs_6s"] {
            if !models.iter().any(|m| m == fallback) {
                models.push(fallback.to_string());
            }
        }
        for model in models {
            let dir = out_dir.join(model).join(&basename);
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    warn!(path = %dir.display(), error = %e, "could not remove stem directory");
                }
            }
        }
    }
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove intermediate file");
        }
    }
}
