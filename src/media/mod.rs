//! Media probing and audio export.
//!
//! The session talks to media only through [`MediaService`]. The production
//! implementation shells out to ffprobe and ffmpeg; tests substitute a fake.

pub mod export;
pub mod ffmpeg;
pub mod probe;

use crate::config::ExportSettings;
use crate::error::ConverterError;
use crate::timecode;
use std::path::{Path, PathBuf};

pub use export::FfmpegMediaService;

/// Video container extensions accepted by the input picker.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "flv", "m4v"];

/// Returns true if `path` has one of [`VIDEO_EXTENSIONS`] (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

/// Result of probing a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
}

impl MediaInfo {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Human-readable line shown under the file name, e.g. `Duration 01:02.500, size 3.25 MB`.
    pub fn summary(&self) -> String {
        format!(
            "Duration {}, size {:.2} MB",
            timecode::format_secs(self.duration_secs),
            self.size_mb()
        )
    }
}

/// Coarse export milestones, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportStage {
    /// The input was opened for decoding
    Opened,
    /// The `[start, end]` window was resolved
    RangeExtracted,
    /// The audio stream was selected, video dropped
    AudioExtracted,
    /// The fade-out filter was set up
    FadeApplied,
    /// The MP3 was written
    Encoded,
}

impl ExportStage {
    pub fn percent(self) -> u8 {
        match self {
            Self::Opened => 10,
            Self::RangeExtracted => 30,
            Self::AudioExtracted => 50,
            Self::FadeApplied => 70,
            Self::Encoded => 100,
        }
    }
}

/// A fully validated export, ready to hand to a [`MediaService`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub start_secs: f64,
    pub end_secs: f64,
    pub settings: ExportSettings,
}

impl ExportRequest {
    /// Length of the exported clip in seconds.
    pub fn clip_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }

    /// Fade-out length, never longer than the clip itself.
    pub fn fade_secs(&self) -> f64 {
        self.settings.fade_out_secs.clamp(0.0, self.clip_secs())
    }

    /// Offset of the fade-out start, relative to the start of the clip.
    pub fn fade_start_secs(&self) -> f64 {
        (self.clip_secs() - self.fade_secs()).max(0.0)
    }
}

/// Synchronous media operations used by the converter session.
///
/// Implementations are `Send + Sync` so the UI can run an export on a worker
/// thread while the session logic stays the same.
pub trait MediaService: Send + Sync {
    /// Reads duration and size without decoding the whole file.
    ///
    /// # Errors
    /// - `FileRead` if the file cannot be opened or has no readable duration
    fn probe(&self, path: &Path) -> Result<MediaInfo, ConverterError>;

    /// Extracts, fades and encodes the requested range, reporting percentages to `progress`.
    ///
    /// # Errors
    /// - `Export` with the underlying message on any decode, encode or disk failure
    fn export_audio(
        &self,
        request: &ExportRequest,
        progress: &mut dyn FnMut(u8),
    ) -> Result<PathBuf, ConverterError>;
}
