//! Demucs separation adapter
//!
//! Runs the stem-separation tool as a long-lived subprocess under a hard
//! wall-clock timeout, scrapes percentage markers from its output streams
//! as an advisory progress signal, and locates the produced drum-less
//! stem among the tool's version-dependent output layouts.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Lines of diagnostic output retained for error messages.
const TAIL_LINES: usize = 25;

#[derive(Debug, Error)]
pub enum SeparationError {
    #[error("could not spawn separation tool: {0}")]
    Spawn(String),

    #[error("separation tool exited with {code}: {tail}")]
    ToolFailed { code: String, tail: String },

    #[error("separation timed out after {0:?} and was terminated")]
    Timeout(Duration),

    #[error("separation finished but no output stem was found; {listing}")]
    OutputNotFound { listing: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct DemucsSeparator<'a> {
    config: &'a Config,
}

impl<'a> DemucsSeparator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Separate `input` into two stems (drums / no_drums) and return the
    /// path of the drum-less stem. Progress percentages scraped from the
    /// tool's output are sent on `progress` as they arrive; the signal is
    /// lossy and the receiver applies the monotonic clamp.
    pub async fn separate(
        &self,
        input: &Path,
        progress: mpsc::UnboundedSender<u8>,
    ) -> Result<PathBuf, SeparationError> {
        let out_dir = self.config.separated_dir();
        tokio::fs::create_dir_all(&out_dir).await?;

        let mut command = Command::new(&self.config.demucs_path);
        command
            .arg("--two-stems")
            .arg("drums")
            .arg("-n")
            .arg(&self.config.demucs_model)
            .arg("-o")
            .arg(&out_dir);
        if let Some(segment) = self.config.demucs_segment {
            command.arg("--segment").arg(segment.to_string());
        }
        if let Some(jobs) = self.config.demucs_jobs {
            command.arg("-j").arg(jobs.to_string());
        }
        command
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            input = %input.display(),
            model = %self.config.demucs_model,
            "starting separation"
        );

        let mut child = command
            .spawn()
            .map_err(|e| SeparationError::Spawn(e.to_string()))?;

        // Progress markers arrive on stderr (and occasionally stdout);
        // scan both while the child runs.
        let stdout = child.stdout.take().expect("stdout is piped");
        let stderr = child.stderr.take().expect("stderr is piped");
        let stdout_scan = tokio::spawn(scan_stream(stdout, progress.clone()));
        let stderr_scan = tokio::spawn(scan_stream(stderr, progress));

        let status = match tokio::time::timeout(self.config.separation_timeout, child.wait()).await
        {
            Ok(status) => status?,
            Err(_) => {
                warn!("separation exceeded timeout, killing subprocess");
                let _ = child.kill().await;
                return Err(SeparationError::Timeout(self.config.separation_timeout));
            }
        };

        let stdout_tail = stdout_scan.await.unwrap_or_default();
        let stderr_tail = stderr_scan.await.unwrap_or_default();

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let tail = if stderr_tail.is_empty() {
                stdout_tail
            } else {
                stderr_tail
            };
            return Err(SeparationError::ToolFailed { code, tail });
        }

        self.locate_stem(&out_dir, input)
    }

    /// Probe the ordered candidate output paths. The on-disk layout is
    /// `<out_dir>/<model>/<input basename>/no_drums.{wav,mp3}`, with the
    /// model directory varying by tool version.
    fn locate_stem(&self, out_dir: &Path, input: &Path) -> Result<PathBuf, SeparationError> {
        let basename = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut models = vec![self.config.demucs_model.as_str()];
        for fallback in ["htdemucs", "htdemucs_6s"] {
            if !models.contains(&fallback) {
                models.push(fallback);
            }
        }

        for model in &models {
            for file in ["no_drums.wav", "no_drums.mp3"] {
                let candidate = out_dir.join(model).join(&basename).join(file);
                if candidate.exists() {
                    debug!(stem = %candidate.display(), "located output stem");
                    return Ok(candidate);
                }
            }
        }

        // List what the tool actually produced, for layout-mismatch
        // diagnosis.
        let primary = out_dir.join(models[0]).join(&basename);
        let listing = match std::fs::read_dir(&primary) {
            Ok(entries) => {
                let names: Vec<String> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect();
                format!("directory {} contains: [{}]", primary.display(), names.join(", "))
            }
            Err(_) => format!("directory {} does not exist", primary.display()),
        };
        Err(SeparationError::OutputNotFound { listing })
    }
}

/// Read a child output stream to EOF, emitting every percentage marker on
/// `progress` and returning a bounded tail of the text for diagnostics.
/// Progress-style output is carriage-return separated, so the scanner
/// splits on both `\r` and `\n`.
async fn scan_stream<R>(mut reader: R, progress: mpsc::UnboundedSender<u8>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        pending.extend_from_slice(&buf[..n]);

        while let Some(pos) = pending.iter().position(|&b| b == b'\n' || b == b'\r') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            handle_line(&line[..line.len() - 1], &progress, &mut tail);
        }
    }
    if !pending.is_empty() {
        handle_line(&pending, &progress, &mut tail);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

fn handle_line(raw: &[u8], progress: &mpsc::UnboundedSender<u8>, tail: &mut VecDeque<String>) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if let Some(pct) = parse_progress(line) {
        let _ = progress.send(pct);
    }
    if tail.len() == TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line.to_string());
}

/// Extract a percentage value from a progress line such as
/// ` 45%|████      | 54.0/120.0 [00:31<00:38]`. Best effort; `None` when
/// the line carries no usable marker.
pub fn parse_progress(line: &str) -> Option<u8> {
    let percent_pos = line.find('%')?;
    let head = &line[..percent_pos];

    // Walk back over the numeric run directly before '%'.
    let start = head
        .rfind(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0);
    let number = &head[start..];
    if number.is_empty() {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    if !(0.0..=100.0).contains(&value) {
        return None;
    }
    Some(value.floor() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tqdm_style_lines() {
        assert_eq!(parse_progress(" 45%|████      | 54.0/120.0"), Some(45));
        assert_eq!(parse_progress("100%|██████████| 120.0/120.0"), Some(100));
        assert_eq!(parse_progress("  5%|          |"), Some(5));
        assert_eq!(parse_progress("12.5%|"), Some(12));
    }

    #[test]
    fn ignores_lines_without_markers() {
        assert_eq!(parse_progress("Separating track input.mp3"), None);
        assert_eq!(parse_progress("%|"), None);
        assert_eq!(parse_progress("loudness -14 LUFS"), None);
        assert_eq!(parse_progress("970% weird"), None);
    }

    #[cfg(unix)]
    mod subprocess {
        use super::super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script into `dir`.
        fn script(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh\n{body}").unwrap();
            let mut perms = file.metadata().unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path.to_string_lossy().to_string()
        }

        fn input_file(dir: &Path) -> PathBuf {
            let input = dir.join("track.mp3");
            std::fs::write(&input, b"ID3fake").unwrap();
            input
        }

        #[tokio::test]
        async fn success_reports_progress_and_locates_stem() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::for_tests(dir.path().to_path_buf());
            let stem_dir = config.separated_dir().join("htdemucs").join("track");
            config.demucs_path = script(
                dir.path(),
                "demucs",
                &format!(
                    "echo ' 50%|#####     |' >&2\n\
                     echo '100%|##########|' >&2\n\
                     mkdir -p {d}\n\
                     printf 'RIFFxxxxWAVE' > {d}/no_drums.wav",
                    d = stem_dir.display()
                ),
            );

            let input = input_file(dir.path());
            let (tx, mut rx) = mpsc::unbounded_channel();
            let stem = DemucsSeparator::new(&config)
                .separate(&input, tx)
                .await
                .unwrap();
            assert!(stem.ends_with("htdemucs/track/no_drums.wav"));

            let mut seen = Vec::new();
            while let Ok(pct) = rx.try_recv() {
                seen.push(pct);
            }
            assert!(seen.contains(&50) && seen.contains(&100), "{seen:?}");
        }

        #[tokio::test]
        async fn nonzero_exit_carries_diagnostic_tail() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::for_tests(dir.path().to_path_buf());
            config.demucs_path = script(
                dir.path(),
                "demucs",
                "echo 'CUDA out of memory' >&2\nexit 1",
            );

            let input = input_file(dir.path());
            let (tx, _rx) = mpsc::unbounded_channel();
            let err = DemucsSeparator::new(&config)
                .separate(&input, tx)
                .await
                .unwrap_err();
            match err {
                SeparationError::ToolFailed { code, tail } => {
                    assert_eq!(code, "1");
                    assert!(tail.contains("CUDA out of memory"));
                }
                other => panic!("expected ToolFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn timeout_kills_the_subprocess() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::for_tests(dir.path().to_path_buf());
            config.separation_timeout = Duration::from_millis(200);
            config.demucs_path = script(dir.path(), "demucs", "sleep 30");

            let input = input_file(dir.path());
            let (tx, _rx) = mpsc::unbounded_channel();
            let err = DemucsSeparator::new(&config)
                .separate(&input, tx)
                .await
                .unwrap_err();
            assert!(matches!(err, SeparationError::Timeout(_)), "{err:?}");
        }

        #[tokio::test]
        async fn missing_output_lists_directory_contents() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::for_tests(dir.path().to_path_buf());
            let stem_dir = config.separated_dir().join("htdemucs").join("track");
            // Tool "succeeds" but writes an unexpected stem name.
            config.demucs_path = script(
                dir.path(),
                "demucs",
                &format!(
                    "mkdir -p {d}\nprintf 'RIFF' > {d}/vocals.wav",
                    d = stem_dir.display()
                ),
            );

            let input = input_file(dir.path());
            let (tx, _rx) = mpsc::unbounded_channel();
            let err = DemucsSeparator::new(&config)
                .separate(&input, tx)
                .await
                .unwrap_err();
            match err {
                SeparationError::OutputNotFound { listing } => {
                    assert!(listing.contains("vocals.wav"), "{listing}");
                }
                other => panic!("expected OutputNotFound, got {other:?}"),
            }
        }
    }
}
