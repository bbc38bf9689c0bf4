//! Service layer: external collaborator adapters and the job pipeline
//!
//! Each adapter exposes one operation: given inputs, produce an output
//! file or fail with a reason specific enough for the orchestrator to
//! build an informative aggregate error.

pub mod acquisition;
pub mod hosted_api;
pub mod media;
pub mod pipeline;
pub mod proxy;
pub mod search_client;
pub mod separator;
pub mod transcoder;
pub mod ytdlp;

pub use acquisition::AcquireError;
pub use media::{MediaError, MediaKind};
pub use pipeline::PipelineError;
pub use search_client::{SearchClient, SearchError};
pub use separator::{DemucsSeparator, SeparationError};
pub use transcoder::{FfmpegTranscoder, TranscodeError};

/// Bounded tail of a tool's diagnostic output, for error messages.
/// Keeps the last `max_lines` non-empty lines.
pub(crate) fn output_tail(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
