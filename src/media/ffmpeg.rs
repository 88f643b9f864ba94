//! FFmpeg tool locator.
//!
//! Finds the `ffmpeg`, `ffprobe` and `ffplay` binaries. Checks standard installation
//! locations before falling back to PATH search, so the tools are found even when
//! launched from environments with a limited PATH.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// Locates the ffmpeg binary used for export.
pub fn find_ffmpeg() -> Result<PathBuf> {
    find_tool("ffmpeg")
}

/// Locates the ffprobe binary used for probing duration and size.
pub fn find_ffprobe() -> Result<PathBuf> {
    find_tool("ffprobe")
}

/// Locates one of the ffmpeg suite binaries on the system.
///
/// Checks in this order:
/// 1. An absolute path, if `name` is one
/// 2. Platform install locations (Homebrew, /usr/bin, snap, C:\ffmpeg)
/// 3. PATH search via `which` or `where`
pub fn find_tool(name: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_absolute() {
        return if direct.exists() {
            Ok(direct)
        } else {
            Err(anyhow!("{} does not exist", direct.display()))
        };
    }

    for path in candidate_paths(name) {
        if path.exists() {
            tracing::debug!("Found {} at: {}", name, path.display());
            return Ok(path);
        }
    }

    let path = find_in_path(name)?;
    tracing::debug!("Found {} in PATH at: {}", name, path.display());
    Ok(path)
}

fn candidate_paths(name: &str) -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![
            PathBuf::from(format!("/opt/homebrew/bin/{name}")), // Apple Silicon Homebrew
            PathBuf::from(format!("/usr/local/bin/{name}")),
            PathBuf::from(format!("/usr/bin/{name}")),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from(format!("/usr/bin/{name}")),
            PathBuf::from(format!("/usr/local/bin/{name}")),
            PathBuf::from(format!("/snap/bin/{name}")),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from(format!("C:\\ffmpeg\\bin\\{name}.exe")),
            PathBuf::from(format!("C:\\Program Files\\ffmpeg\\bin\\{name}.exe")),
        ]
    } else {
        vec![]
    }
}

/// Searches for a binary in the system PATH.
///
/// Uses `which` on Unix systems and `where` on Windows.
fn find_in_path(binary_name: &str) -> Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = std::process::Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        // `where` can print several matches, one per line
        if let Some(first) = path_str.lines().map(str::trim).find(|l| !l.is_empty()) {
            return Ok(PathBuf::from(first));
        }
    }

    Err(anyhow!(
        "{binary_name} not found. Please install ffmpeg:\n\
         macOS: brew install ffmpeg\n\
         Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
         Windows: Download from https://ffmpeg.org/download.html"
    ))
}
