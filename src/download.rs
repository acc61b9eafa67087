// Download side effects and the deterministic filename conventions.
//
// The filename formats are a compatibility contract with previously exported
// assets and must not change.

use chrono::{DateTime, Local};

use crate::models::schema::{DownloadData, DownloadKind};

/// `Image_Editor_Frame_{index+1, 3 digits}_{YYYY-MM-DD}.png`
pub fn editor_frame_filename(frame_index: usize, at: DateTime<Local>) -> String {
    format!(
        "Image_Editor_Frame_{:03}_{}.png",
        frame_index + 1,
        at.format("%Y-%m-%d")
    )
}

/// `Frame_{3 digits}_seq_gen_{YYYY-MM-DD}_{HH-MM-SS}.png` — the time portion
/// uses hyphens where a clock would use colons.
pub fn sequence_frame_filename(frame_index: usize, at: DateTime<Local>) -> String {
    format!(
        "Frame_{:03}_seq_gen_{}_{}.png",
        frame_index + 1,
        at.format("%Y-%m-%d"),
        at.format("%H-%M-%S")
    )
}

/// Filename for single-output downloads triggered by chain execution.
pub fn output_filename(kind: DownloadKind, at: DateTime<Local>) -> String {
    match kind {
        DownloadKind::Image => format!("Image_{}.png", at.format("%Y-%m-%d_%H-%M-%S")),
        DownloadKind::Video => format!("Video_{}.mp4", at.format("%Y-%m-%d_%H-%M-%S")),
    }
}

/// Collaborator that materializes a download. The engine triggers downloads
/// immediately after the producing node's write, never batched or deferred.
pub trait DownloadSink: Send + Sync {
    fn download(&self, data: &DownloadData, filename: &str);
}

/// Default sink for embedders that handle downloads elsewhere.
pub struct NoopDownloads;

impl DownloadSink for NoopDownloads {
    fn download(&self, data: &DownloadData, filename: &str) {
        log::debug!("discarding download '{}' ({} bytes url)", filename, data.url.len());
    }
}
