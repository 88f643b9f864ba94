//! File probing using `ffprobe -show_entries format=duration,size -of json`.

use super::ffmpeg::find_ffprobe;
use super::MediaInfo;
use crate::error::ConverterError;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

/// Probes a media file for its duration and size.
///
/// Falls back to filesystem metadata when ffprobe does not report a size.
///
/// # Errors
/// - `FileRead` if the file does not exist, ffprobe is missing or fails, or no duration is reported
pub fn probe_file(path: &Path) -> Result<MediaInfo, ConverterError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ConverterError::FileRead(format!("{}: {e}", path.display())))?;

    tracing::debug!("Probing file: {}", path.display());

    let ffprobe = find_ffprobe().map_err(|e| ConverterError::FileRead(e.to_string()))?;
    let output = Command::new(&ffprobe)
        .args(["-v", "error", "-show_entries", "format=duration,size", "-of", "json"])
        .arg(path)
        .output()
        .map_err(|e| ConverterError::FileRead(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("ffprobe failed for {}: {}", path.display(), stderr.trim());
        return Err(ConverterError::FileRead(stderr.trim().to_string()));
    }

    let mut info = parse_probe_json(&output.stdout, path)?;
    if info.size_bytes == 0 {
        info.size_bytes = metadata.len();
    }

    tracing::info!(
        "Probed {}: {:.3}s, {} bytes",
        path.display(),
        info.duration_secs,
        info.size_bytes
    );
    Ok(info)
}

/// Parses ffprobe's JSON output.
fn parse_probe_json(stdout: &[u8], path: &Path) -> Result<MediaInfo, ConverterError> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ConverterError::FileRead(format!("Unexpected ffprobe output: {e}")))?;

    let format = parsed
        .format
        .ok_or_else(|| ConverterError::FileRead("ffprobe reported no container format".to_string()))?;

    let duration_secs = format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ConverterError::FileRead("ffprobe reported no duration".to_string()))?;

    let size_bytes = format
        .size
        .as_deref()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaInfo {
        path: path.to_path_buf(),
        duration_secs,
        size_bytes,
    })
}
