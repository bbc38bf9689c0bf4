//! Acquired-payload validation
//!
//! Download providers fail in creative ways: HTML login walls, JSON error
//! bodies, and rate-limit text all arrive with a 200 status. Before any
//! expensive separation run, the saved file is sniffed to confirm it is
//! plausibly audio.

use std::path::Path;

use thiserror::Error;

/// Sniffed container kind of an acquired file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Mp3,
    Wav,
    Flac,
    Ogg,
    M4a,
    Webm,
    /// Magic bytes matched nothing known; tolerated but normalized first.
    Unknown,
}

impl MediaKind {
    /// Containers the separation tool ingests directly. Anything else is
    /// re-encoded to WAV before separation.
    pub fn needs_normalization(&self) -> bool {
        !matches!(self, MediaKind::Mp3 | MediaKind::Wav | MediaKind::Flac)
    }
}

/// Why a saved payload was rejected as non-media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("downloaded file is missing: {0}")]
    Missing(String),

    #[error("downloaded file is empty")]
    Empty,

    #[error("payload looks like {kind}, not audio: {excerpt:?}")]
    NotMedia { kind: &'static str, excerpt: String },

    #[error("could not read downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

/// Markers that identify provider error bodies masquerading as media.
const RATE_LIMIT_MARKERS: [&str; 4] = ["rate limit", "too many requests", "quota", "captcha"];

/// Validate a saved download: present, non-empty, and not a textual error
/// body. Returns the sniffed container kind on success.
pub fn check_media_file(path: &Path) -> Result<MediaKind, MediaError> {
    if !path.exists() {
        return Err(MediaError::Missing(path.display().to_string()));
    }
    let meta = std::fs::metadata(path)?;
    if meta.len() == 0 {
        return Err(MediaError::Empty);
    }

    // Only the head is needed for both magic bytes and text markers.
    let head = read_head(path, 4096)?;
    sniff_bytes(&head)
}

/// Sniff an in-memory head-of-file buffer. Split out for unit testing.
pub fn sniff_bytes(head: &[u8]) -> Result<MediaKind, MediaError> {
    if head.is_empty() {
        return Err(MediaError::Empty);
    }

    if let Some(kind) = infer::get(head) {
        return match kind.mime_type() {
            "audio/mpeg" => Ok(MediaKind::Mp3),
            "audio/x-wav" | "audio/wav" => Ok(MediaKind::Wav),
            "audio/x-flac" | "audio/flac" => Ok(MediaKind::Flac),
            "audio/ogg" | "application/ogg" => Ok(MediaKind::Ogg),
            "audio/m4a" | "audio/mp4" | "video/mp4" => Ok(MediaKind::M4a),
            "video/webm" | "audio/webm" => Ok(MediaKind::Webm),
            "text/html" => Err(not_media("HTML", head)),
            other if other.starts_with("audio/") || other.starts_with("video/") => {
                Ok(MediaKind::Unknown)
            }
            _ => Err(not_media(kind.mime_type(), head)),
        };
    }

    // ID3v2-tagged MP3s are common and not covered by magic sniffers.
    if head.starts_with(b"ID3") {
        return Ok(MediaKind::Mp3);
    }

    // No known magic: reject anything that reads as an error document.
    if let Ok(text) = std::str::from_utf8(head) {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Err(not_media("JSON", head));
        }
        if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") || trimmed.starts_with('<') {
            return Err(not_media("HTML", head));
        }
        let lower = trimmed.to_ascii_lowercase();
        if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
            return Err(not_media("a rate-limit notice", head));
        }
    }

    Ok(MediaKind::Unknown)
}

/// Quick accept/reject on an HTTP `Content-Type` header before the body
/// is even saved.
pub fn content_type_is_media(content_type: &str) -> bool {
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    ct.starts_with("audio/")
        || ct.starts_with("video/")
        || ct == "application/octet-stream"
        || ct == "binary/octet-stream"
}

fn not_media(kind: &'static str, head: &[u8]) -> MediaError {
    let excerpt: String = String::from_utf8_lossy(head)
        .chars()
        .take(120)
        .collect();
    MediaError::NotMedia { kind, excerpt }
}

fn read_head(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; limit];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn id3_tagged_mp3_is_accepted() {
        let head = b"ID3\x04\x00\x00\x00\x00\x00\x00rest of tag".to_vec();
        assert_eq!(sniff_bytes(&head).unwrap(), MediaKind::Mp3);
    }

    #[test]
    fn mpeg_frame_sync_is_accepted() {
        // 0xFF 0xFB is an MPEG-1 Layer III frame header
        let mut head = vec![0xFFu8, 0xFB, 0x90, 0x00];
        head.extend_from_slice(&[0u8; 64]);
        assert_eq!(sniff_bytes(&head).unwrap(), MediaKind::Mp3);
    }

    #[test]
    fn riff_wav_is_accepted() {
        let mut head = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
        head.extend_from_slice(&[0u8; 32]);
        assert_eq!(sniff_bytes(&head).unwrap(), MediaKind::Wav);
    }

    #[test]
    fn html_body_is_rejected() {
        let err = sniff_bytes(b"<!DOCTYPE html><html><body>Sign in</body></html>").unwrap_err();
        assert!(matches!(err, MediaError::NotMedia { kind: "HTML", .. }));
    }

    #[test]
    fn json_error_body_is_rejected() {
        let err = sniff_bytes(br#"{"error": "video unavailable"}"#).unwrap_err();
        assert!(matches!(err, MediaError::NotMedia { kind: "JSON", .. }));
    }

    #[test]
    fn rate_limit_text_is_rejected() {
        let err = sniff_bytes(b"Too many requests. Please retry later.").unwrap_err();
        assert!(matches!(err, MediaError::NotMedia { .. }));
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            check_media_file(file.path()),
            Err(MediaError::Empty)
        ));
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.mp3");
        assert!(matches!(
            check_media_file(&path),
            Err(MediaError::Missing(_))
        ));
    }

    #[test]
    fn saved_mp3_passes_end_to_end() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ID3\x03\x00\x00\x00\x00\x00\x21").unwrap();
        file.write_all(&[0u8; 512]).unwrap();
        assert_eq!(check_media_file(file.path()).unwrap(), MediaKind::Mp3);
    }

    #[test]
    fn content_type_gate() {
        assert!(content_type_is_media("audio/mpeg"));
        assert!(content_type_is_media("audio/mp4; charset=binary"));
        assert!(content_type_is_media("application/octet-stream"));
        assert!(!content_type_is_media("text/html; charset=utf-8"));
        assert!(!content_type_is_media("application/json"));
    }

    #[test]
    fn normalization_policy() {
        assert!(!MediaKind::Mp3.needs_normalization());
        assert!(!MediaKind::Wav.needs_normalization());
        assert!(MediaKind::Webm.needs_normalization());
        assert!(MediaKind::Ogg.needs_normalization());
        assert!(MediaKind::Unknown.needs_normalization());
    }
}
