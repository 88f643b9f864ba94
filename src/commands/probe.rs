//! Prints what the converter shows for a video file.

use crate::media::{FfmpegMediaService, MediaService};
use std::path::Path;

/// Probes `file` and prints its duration and size.
///
/// # Errors
/// - If the file cannot be probed
pub fn handle_probe(file: &Path) -> anyhow::Result<()> {
    let info = FfmpegMediaService::new().probe(file)?;
    tracing::info!("Probed {}: {}", file.display(), info.summary());
    println!("{}", info.path.display());
    println!("{}", info.summary());
    Ok(())
}
