//! MP3 export through ffmpeg.
//!
//! One ffmpeg run seeks to the range start, keeps only the audio, applies a
//! linear fade-out over the clip's tail and encodes with libmp3lame. Progress
//! comes from ffmpeg's `-progress pipe:1` key/value stream.

use super::ffmpeg::find_ffmpeg;
use super::probe::probe_file;
use super::{ExportRequest, ExportStage, MediaInfo, MediaService};
use crate::error::ConverterError;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// [`MediaService`] backed by the ffmpeg command line tools.
#[derive(Debug, Default, Clone)]
pub struct FfmpegMediaService;

impl FfmpegMediaService {
    pub fn new() -> Self {
        Self
    }
}

impl MediaService for FfmpegMediaService {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ConverterError> {
        probe_file(path)
    }

    fn export_audio(
        &self,
        request: &ExportRequest,
        progress: &mut dyn FnMut(u8),
    ) -> Result<PathBuf, ConverterError> {
        run_export(request, progress)
    }
}

/// Builds the ffmpeg argument list for an export, excluding the binary itself.
pub fn build_export_args(request: &ExportRequest) -> Vec<String> {
    let settings = &request.settings;
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(), // Overwrite output
        "-ss".into(),
        format!("{:.3}", request.start_secs),
        "-i".into(),
        request.input.to_string_lossy().into_owned(),
        "-t".into(),
        format!("{:.3}", request.clip_secs()),
        "-vn".into(),
    ];

    if request.fade_secs() > 0.0 {
        args.push("-af".into());
        args.push(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            request.fade_start_secs(),
            request.fade_secs()
        ));
    }

    args.extend([
        "-acodec".into(),
        "libmp3lame".into(),
        "-b:a".into(),
        format!("{}k", settings.bitrate_kbps),
        "-ar".into(),
        settings.sample_rate.to_string(),
        "-sample_fmt".into(),
        settings.sample_format().to_string(),
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
        request.output.to_string_lossy().into_owned(),
    ]);

    args
}

/// Maps one line of ffmpeg's `-progress` output to an encode percentage.
///
/// Encoding fills the band between the fade milestone and completion; 100 is
/// never produced here, only when ffmpeg exits successfully.
pub fn parse_progress_line(line: &str, clip_secs: f64) -> Option<u8> {
    let (key, value) = line.trim().split_once('=')?;
    // out_time_ms is microseconds despite its name, same as out_time_us
    if key != "out_time_us" && key != "out_time_ms" {
        return None;
    }
    let micros: f64 = value.trim().parse().ok()?;
    if clip_secs <= 0.0 || micros < 0.0 {
        return None;
    }

    let fraction = (micros / 1_000_000.0 / clip_secs).clamp(0.0, 1.0);
    let floor = ExportStage::FadeApplied.percent() as f64;
    let span = 99.0 - floor;
    Some((floor + fraction * span).floor() as u8)
}

fn run_export(request: &ExportRequest, progress: &mut dyn FnMut(u8)) -> Result<PathBuf, ConverterError> {
    if !request.input.is_file() {
        return Err(ConverterError::export(format!(
            "Input file not found: {}",
            request.input.display()
        )));
    }
    progress(ExportStage::Opened.percent());

    if request.clip_secs() <= 0.0 {
        return Err(ConverterError::export("Selected range is empty"));
    }
    progress(ExportStage::RangeExtracted.percent());

    let ffmpeg_path = find_ffmpeg().map_err(|e| ConverterError::export(e.to_string()))?;
    let args = build_export_args(request);
    progress(ExportStage::AudioExtracted.percent());

    tracing::info!(
        "Exporting {} [{:.3}s - {:.3}s] to {}",
        request.input.display(),
        request.start_secs,
        request.end_secs,
        request.output.display()
    );
    tracing::debug!("ffmpeg {}", args.join(" "));

    let mut child = Command::new(&ffmpeg_path)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ConverterError::export(format!("Failed to start ffmpeg: {e}")))?;
    progress(ExportStage::FadeApplied.percent());

    // stderr is drained on its own thread so a chatty ffmpeg cannot block on a full pipe
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Some(percent) = parse_progress_line(&line, request.clip_secs()) {
                progress(percent);
            }
        }
    }

    let status = child
        .wait()
        .map_err(|e| ConverterError::export(format!("Failed to wait for ffmpeg: {e}")))?;
    let stderr_text = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !status.success() {
        let message = if stderr_text.trim().is_empty() {
            format!("ffmpeg exited with status {status}")
        } else {
            stderr_text.trim().to_string()
        };
        tracing::error!("ffmpeg export failed: {}", message);
        return Err(ConverterError::Export(message));
    }

    let size = std::fs::metadata(&request.output)
        .map_err(|e| ConverterError::export(format!("{}: {e}", request.output.display())))?
        .len();
    tracing::info!("Audio saved: {} ({} bytes)", request.output.display(), size);

    progress(ExportStage::Encoded.percent());
    Ok(request.output.clone())
}
