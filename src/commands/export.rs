//! Headless export command.
//!
//! Applies the same selection and validation rules as the interactive
//! converter, without a preview, and prints progress to stderr.

use crate::config::{ClipConfig, TomlSettingsStore};
use crate::media::FfmpegMediaService;
use crate::playback::NullPlayer;
use crate::session::ConverterSession;
use crate::timecode;
use anyhow::Context;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Exports `[start, end]` of `file` as an MP3.
///
/// The output folder is `output`, else the last one used, else the current
/// directory. Without `end` the default range end (duration minus the tail
/// trim) applies.
///
/// # Errors
/// - If a time cannot be parsed
/// - If the file cannot be probed
/// - If the range is invalid or the export fails
pub async fn handle_export(
    file: PathBuf,
    start: Option<String>,
    end: Option<String>,
    output: Option<PathBuf>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let start_secs = start.as_deref().map(timecode::parse).transpose()?;
    let end_secs = end.as_deref().map(timecode::parse).transpose()?;

    let config = ClipConfig::load_or_create().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        ClipConfig::default()
    });
    let settings = TomlSettingsStore::open_default()?;
    let mut session = ConverterSession::new(
        Arc::new(FfmpegMediaService::new()),
        Box::new(NullPlayer::new()),
        Box::new(settings),
        config.export,
    );

    session.load_input(&file)?;

    let output_dir = match output.or_else(|| session.job().output_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine the current directory")?,
    };
    session.set_output_dir(&output_dir)?;

    if let Some(secs) = start_secs {
        session.set_range_start(secs);
    }
    if let Some(secs) = end_secs {
        session.set_range_end(secs);
    }
    if let Some(name) = name {
        session.set_file_name(name);
    }

    let job = session.job();
    eprintln!(
        "Exporting {} [{} - {}]",
        file.display(),
        timecode::format_secs(job.range_start),
        timecode::format_secs(job.range_end)
    );

    let mut stderr = std::io::stderr();
    let path = session.export_audio(&mut |percent| {
        let _ = write!(stderr, "\rProgress: {percent:>3}%");
        let _ = stderr.flush();
    });
    eprintln!();

    let path = path?;
    println!("{}", path.display());
    Ok(())
}
