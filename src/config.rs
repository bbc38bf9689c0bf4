//! Configuration resolution for drumless
//!
//! Priority per setting: environment variable → TOML config file → default.
//! The TOML file is optional and lives at `~/.config/drumless/config.toml`
//! (platform config dir), or at the path named by `DRUMLESS_CONFIG`.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

/// Optional TOML config file contents. Every field has an environment
/// override; the file only supplies values the environment omits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub media_dir: Option<String>,
    pub rapidapi_key: Option<String>,
    pub rapidapi_host: Option<String>,
    pub enable_ytdlp: Option<bool>,
    pub ytdlp_path: Option<String>,
    pub proxy_url: Option<String>,
    pub demucs_path: Option<String>,
    pub demucs_model: Option<String>,
    pub demucs_segment: Option<u32>,
    pub demucs_jobs: Option<u32>,
    pub output_bitrate: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub download_timeout_secs: Option<u64>,
    pub separation_timeout_secs: Option<u64>,
    pub job_timeout_secs: Option<u64>,
}

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, e.g. "127.0.0.1:5730"
    pub bind: String,

    /// Base directory for input/intermediate/output audio files
    pub media_dir: PathBuf,

    /// Serverless deployment: temp-only filesystem, pipeline disabled
    pub serverless: bool,

    /// Hosted download API credential; strategy skipped when absent
    pub rapidapi_key: Option<String>,
    /// Hosted download API host
    pub rapidapi_host: String,

    /// Explicit opt-in for the yt-dlp CLI fallback, never silently used
    pub enable_ytdlp: bool,
    /// yt-dlp executable (name or absolute path)
    pub ytdlp_path: String,

    /// Self-hosted download proxy base URL; strategy skipped when absent
    pub proxy_url: Option<String>,

    /// Demucs executable (name or absolute path)
    pub demucs_path: String,
    /// Demucs model name, also the first output subdirectory to probe
    pub demucs_model: String,
    /// Demucs `--segment` override
    pub demucs_segment: Option<u32>,
    /// Demucs `--jobs` parallelism override
    pub demucs_jobs: Option<u32>,

    /// MP3 bitrate for the final encode, e.g. "192k"
    pub output_bitrate: String,
    /// ffmpeg executable (name or absolute path)
    pub ffmpeg_path: String,

    /// Per-strategy download timeout
    pub download_timeout: Duration,
    /// Wall-clock bound on the separation subprocess
    pub separation_timeout: Duration,
    /// Overall bound on one job's pipeline run
    pub job_timeout: Duration,
}

impl Config {
    /// Resolve configuration from the environment, with TOML fallback.
    pub fn resolve() -> Self {
        let file = load_file_config().unwrap_or_default();
        Self::from_sources(&file)
    }

    fn from_sources(file: &FileConfig) -> Self {
        let serverless = env_flag("DRUMLESS_SERVERLESS");

        let media_dir = if serverless {
            // Constrained deployments only have a writable temp dir.
            std::env::temp_dir().join("drumless")
        } else {
            env_str("DRUMLESS_MEDIA_DIR", file.media_dir.as_deref())
                .map(PathBuf::from)
                .unwrap_or_else(default_media_dir)
        };

        Self {
            bind: env_str("DRUMLESS_BIND", file.bind.as_deref())
                .unwrap_or_else(|| "127.0.0.1:5730".to_string()),
            media_dir,
            serverless,
            rapidapi_key: env_str("DRUMLESS_RAPIDAPI_KEY", file.rapidapi_key.as_deref()),
            rapidapi_host: env_str("DRUMLESS_RAPIDAPI_HOST", file.rapidapi_host.as_deref())
                .unwrap_or_else(|| "youtube-mp36.p.rapidapi.com".to_string()),
            enable_ytdlp: env_flag("DRUMLESS_ENABLE_YTDLP") || file.enable_ytdlp.unwrap_or(false),
            ytdlp_path: env_str("DRUMLESS_YTDLP_PATH", file.ytdlp_path.as_deref())
                .unwrap_or_else(|| "yt-dlp".to_string()),
            proxy_url: env_str("DRUMLESS_PROXY_URL", file.proxy_url.as_deref()),
            demucs_path: env_str("DRUMLESS_DEMUCS_PATH", file.demucs_path.as_deref())
                .unwrap_or_else(|| "demucs".to_string()),
            demucs_model: env_str("DRUMLESS_DEMUCS_MODEL", file.demucs_model.as_deref())
                .unwrap_or_else(|| "htdemucs".to_string()),
            demucs_segment: env_u32("DRUMLESS_DEMUCS_SEGMENT").or(file.demucs_segment),
            demucs_jobs: env_u32("DRUMLESS_DEMUCS_JOBS").or(file.demucs_jobs),
            output_bitrate: env_str("DRUMLESS_OUTPUT_BITRATE", file.output_bitrate.as_deref())
                .unwrap_or_else(|| "192k".to_string()),
            ffmpeg_path: env_str("DRUMLESS_FFMPEG_PATH", file.ffmpeg_path.as_deref())
                .unwrap_or_else(|| "ffmpeg".to_string()),
            download_timeout: Duration::from_secs(
                env_u64("DRUMLESS_DOWNLOAD_TIMEOUT_SECS")
                    .or(file.download_timeout_secs)
                    .unwrap_or(600),
            ),
            separation_timeout: Duration::from_secs(
                env_u64("DRUMLESS_SEPARATION_TIMEOUT_SECS")
                    .or(file.separation_timeout_secs)
                    .unwrap_or(1800),
            ),
            job_timeout: Duration::from_secs(
                env_u64("DRUMLESS_JOB_TIMEOUT_SECS")
                    .or(file.job_timeout_secs)
                    .unwrap_or(2700),
            ),
        }
    }

    /// Whether job submissions run the pipeline in this deployment.
    pub fn processing_enabled(&self) -> bool {
        !self.serverless
    }

    /// Directory the separation tool writes its model/track tree into.
    pub fn separated_dir(&self) -> PathBuf {
        self.media_dir.join("separated")
    }

    /// Log the acquisition strategies this configuration enables.
    pub fn log_strategies(&self) {
        if self.rapidapi_key.is_some() {
            info!(host = %self.rapidapi_host, "hosted download API enabled");
        }
        if self.enable_ytdlp {
            info!(path = %self.ytdlp_path, "yt-dlp fallback enabled (explicit opt-in)");
        }
        if let Some(url) = &self.proxy_url {
            info!(url = %url, "download proxy enabled");
        }
        if self.rapidapi_key.is_none() && !self.enable_ytdlp && self.proxy_url.is_none() {
            warn!("no acquisition strategy configured; all submissions will fail");
        }
    }

    /// Minimal configuration for tests: everything disabled, temp paths.
    #[doc(hidden)]
    pub fn for_tests(media_dir: PathBuf) -> Self {
        Self {
            bind: "127.0.0.1:0".to_string(),
            media_dir,
            serverless: false,
            rapidapi_key: None,
            rapidapi_host: "youtube-mp36.p.rapidapi.com".to_string(),
            enable_ytdlp: false,
            ytdlp_path: "yt-dlp".to_string(),
            proxy_url: None,
            demucs_path: "demucs".to_string(),
            demucs_model: "htdemucs".to_string(),
            demucs_segment: None,
            demucs_jobs: None,
            output_bitrate: "192k".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            download_timeout: Duration::from_secs(10),
            separation_timeout: Duration::from_secs(10),
            job_timeout: Duration::from_secs(30),
        }
    }
}

/// Default persistent-host media directory, platform data dir based.
fn default_media_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("drumless").join("audio"))
        .unwrap_or_else(|| PathBuf::from("./drumless_audio"))
}

/// Locate and parse the optional TOML config file.
fn load_file_config() -> Option<FileConfig> {
    let path = match std::env::var("DRUMLESS_CONFIG") {
        Ok(p) => PathBuf::from(p),
        Err(_) => dirs::config_dir()?.join("drumless").join("config.toml"),
    };
    let content = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<FileConfig>(&content) {
        Ok(cfg) => {
            info!(path = %path.display(), "loaded config file");
            Some(cfg)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

fn env_str(var: &str, file_value: Option<&str>) -> Option<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => file_value.map(|s| s.to_string()),
    }
}

fn env_flag(var: &str) -> bool {
    matches!(
        std::env::var(var).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn env_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
