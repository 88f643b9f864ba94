//! Interactive converter command.
//!
//! Runs the converter screen: pick a video, preview it, choose a range and an
//! output folder, then export the range as an MP3 with a fade-out. Exports run
//! on a worker thread and report back over a channel so the screen stays live.

use crate::config::{ClipConfig, TomlSettingsStore};
use crate::desktop;
use crate::error::ConverterError;
use crate::media::{ExportRequest, FfmpegMediaService, MediaService};
use crate::playback::FfplayPlayer;
use crate::session::ConverterSession;
use crate::timecode;
use crate::ui::{ConverterCommand, ConverterTui, Notice, TuiPicker};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

/// Messages from the export worker to the UI thread.
#[derive(Debug)]
pub enum ExportMessage {
    Progress(u8),
    Finished(Result<PathBuf, ConverterError>),
}

/// Starts `request` on a worker thread.
fn spawn_export(media: Arc<dyn MediaService>, request: ExportRequest) -> Receiver<ExportMessage> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let progress_tx = tx.clone();
        let result = media.export_audio(&request, &mut |percent| {
            let _ = progress_tx.send(ExportMessage::Progress(percent));
        });
        if tx.send(ExportMessage::Finished(result)).is_err() {
            tracing::warn!("Export finished after the converter closed");
        }
    });
    rx
}

/// Worker channel state, drained apart from the session so prompts drawn over
/// the converter can keep reporting progress.
#[derive(Default)]
struct ExportMonitor {
    rx: Option<Receiver<ExportMessage>>,
    progress: u8,
    finished: Option<Result<PathBuf, ConverterError>>,
}

impl ExportMonitor {
    fn start(&mut self, rx: Receiver<ExportMessage>) {
        self.rx = Some(rx);
        self.progress = 0;
        self.finished = None;
    }

    /// Takes every pending worker message without blocking.
    fn poll(&mut self) {
        loop {
            let message = match &self.rx {
                Some(rx) => rx.try_recv(),
                None => return,
            };
            match message {
                Ok(ExportMessage::Progress(percent)) => self.progress = self.progress.max(percent),
                Ok(ExportMessage::Finished(result)) => {
                    self.rx = None;
                    self.finished = Some(result);
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.rx = None;
                    self.finished = Some(Err(ConverterError::export("Export worker stopped unexpectedly")));
                }
            }
        }
    }

    /// Footer line for prompts while an export is running or just ended.
    fn status(&mut self) -> Option<String> {
        self.poll();
        if self.rx.is_some() {
            Some(format!("Exporting... {}%", self.progress.min(99)))
        } else if self.finished.is_some() {
            Some("Export finished".to_string())
        } else {
            None
        }
    }

    /// Moves drained state into the session. Returns a notice once the export ends.
    fn apply(&mut self, session: &mut ConverterSession) -> Option<Notice> {
        self.poll();
        session.record_progress(self.progress);
        let result = self.finished.take()?;
        Some(match session.finish_export(result) {
            Ok(path) => Notice::saved(&path),
            Err(e) => Notice::from_error(&e),
        })
    }
}

fn validate_timecode(text: &str) -> Result<(), String> {
    timecode::parse(text).map(|_| ()).map_err(|e| e.to_string())
}

/// Runs the interactive converter.
///
/// `file` and `output` preselect the input video and output folder.
///
/// # Errors
/// - If the terminal cannot be initialized or drawn
pub async fn handle_convert(file: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut startup_notices = Vec::new();

    let config = match ClipConfig::load_or_create() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            startup_notices.push(Notice::warning(
                "Configuration",
                format!("Could not load the configuration, using defaults.\n\n{e}"),
            ));
            ClipConfig::default()
        }
    };

    let settings = TomlSettingsStore::open_default()?;
    let mut session = ConverterSession::new(
        Arc::new(FfmpegMediaService::new()),
        Box::new(FfplayPlayer::new(config.preview.player.clone())),
        Box::new(settings),
        config.export.clone(),
    );

    if let Some(dir) = &output {
        if let Err(e) = session.set_output_dir(dir) {
            startup_notices.push(Notice::from_error(&e));
        }
    }
    if let Some(path) = &file {
        if let Err(e) = session.load_input(path) {
            startup_notices.push(Notice::from_error(&e));
        }
    }

    let mut tui = ConverterTui::new()?;
    for notice in startup_notices {
        tui.show_notice(notice);
    }

    let result = run_loop(&mut tui, &mut session, &config);
    tui.cleanup()?;
    result
}

fn run_loop(
    tui: &mut ConverterTui,
    session: &mut ConverterSession,
    config: &ClipConfig,
) -> anyhow::Result<()> {
    let mut export = ExportMonitor::default();

    loop {
        session.pump_playback();
        if let Some(detail) = session.take_playback_warning() {
            tui.show_notice(Notice::playback(&detail));
        }
        if let Some(notice) = export.apply(session) {
            tui.show_notice(notice);
        }

        tui.draw(session)?;

        match tui.handle_input()? {
            ConverterCommand::Continue => {}
            ConverterCommand::Quit => {
                if session.is_exporting() {
                    tui.show_notice(Notice::info(
                        "Export running",
                        "Wait for the export to finish before quitting.",
                    ));
                } else {
                    tracing::info!("Converter closed");
                    return Ok(());
                }
            }
            ConverterCommand::DismissNotice => tui.dismiss_notice(),
            ConverterCommand::OpenCodecHelp => {
                tui.dismiss_notice();
                if let Err(e) = desktop::open_url(&config.preview.codec_help_url) {
                    tracing::warn!("{}", e);
                    tui.show_notice(Notice::warning(
                        "Browser",
                        format!("{e}\n\nVisit {}", config.preview.codec_help_url),
                    ));
                }
            }
            ConverterCommand::SelectInput => {
                let mut status = || export.status();
                let mut picker = TuiPicker::new(tui, &mut status);
                if let Err(e) = session.select_input_file(&mut picker) {
                    tui.show_notice(Notice::from_error(&e));
                }
            }
            ConverterCommand::SelectOutput => {
                let mut status = || export.status();
                let mut picker = TuiPicker::new(tui, &mut status);
                if let Err(e) = session.select_output_folder(&mut picker) {
                    tui.show_notice(Notice::from_error(&e));
                }
            }
            ConverterCommand::TogglePlay => session.toggle_play(),
            ConverterCommand::SeekBy(delta) => session.seek_by(delta),
            ConverterCommand::ScrubClick { x, width } => session.scrub_click(x, width),
            ConverterCommand::MarkStart => session.mark_start(),
            ConverterCommand::MarkEnd => session.mark_end(),
            ConverterCommand::EditStart => {
                let current = timecode::format_secs(session.job().range_start);
                if let Some(text) = tui.prompt_line(
                    "Start time",
                    "mm:ss.zzz, hh:mm:ss.zzz or seconds",
                    &current,
                    &validate_timecode,
                    &mut || export.status(),
                )? {
                    session.set_range_start(timecode::parse(&text)?);
                }
            }
            ConverterCommand::EditEnd => {
                let current = timecode::format_secs(session.job().range_end);
                if let Some(text) = tui.prompt_line(
                    "End time",
                    "mm:ss.zzz, hh:mm:ss.zzz or seconds",
                    &current,
                    &validate_timecode,
                    &mut || export.status(),
                )? {
                    session.set_range_end(timecode::parse(&text)?);
                }
            }
            ConverterCommand::EditName => {
                let current = session.job().file_name.clone();
                if let Some(text) = tui.prompt_line(
                    "File name",
                    ".mp3 is added when missing",
                    &current,
                    &|_| Ok(()),
                    &mut || export.status(),
                )? {
                    session.set_file_name(text);
                }
            }
            ConverterCommand::Export => match session.begin_export() {
                Ok(request) => {
                    export.start(spawn_export(session.media(), request));
                }
                Err(ConverterError::ExportInFlight) => {
                    tracing::debug!("Export trigger ignored while exporting");
                }
                Err(e) => tui.show_notice(Notice::from_error(&e)),
            },
        }
    }
}
