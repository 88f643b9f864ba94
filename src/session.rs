//! The converter session: one conversion job and the collaborators it drives.
//!
//! All mutation happens on the UI thread. An export can run elsewhere through
//! [`ConverterSession::begin_export`] / [`ConverterSession::finish_export`]; the
//! `exporting` flag guarantees at most one export in flight.

use crate::config::{ExportSettings, SettingsStore};
use crate::error::ConverterError;
use crate::media::{ExportRequest, MediaInfo, MediaService, VIDEO_EXTENSIONS};
use crate::playback::{PlaybackBackend, PlaybackEvent, PlaybackState};
use crate::timecode;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Chooses files and directories on behalf of the user.
///
/// Returns `None` when the user cancels.
pub trait FilePicker {
    fn pick_input_file(&mut self, initial_dir: Option<&Path>, extensions: &[&str]) -> Option<PathBuf>;
    fn pick_output_dir(&mut self, initial_dir: Option<&Path>) -> Option<PathBuf>;
}

/// The single in-memory record of the current selection, range and progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub input_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub duration_secs: f64,
    pub range_start: f64,
    pub range_end: f64,
    pub file_name: String,
    pub progress: u8,
}

impl ConversionJob {
    fn new(file_name: String) -> Self {
        Self {
            input_path: None,
            output_dir: None,
            duration_secs: 0.0,
            range_start: 0.0,
            range_end: 0.0,
            file_name,
            progress: 0,
        }
    }
}

/// Preview state mirrored from playback events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewView {
    pub position_ms: u64,
    /// Upper bound of the scrub bar
    pub duration_ms: u64,
    pub state: PlaybackState,
    pub available: bool,
}

/// Default output name: `<prefix><MMDD_HHMMSS>`.
pub fn default_file_name(prefix: &str) -> String {
    format!("{prefix}{}", Local::now().format("%m%d_%H%M%S"))
}

/// Trims `name` and appends `.mp3` unless it already ends with it.
///
/// An empty name falls back to `fallback`.
pub fn normalize_file_name(name: &str, fallback: &str) -> String {
    let trimmed = name.trim();
    let base = if trimmed.is_empty() { fallback } else { trimmed };
    if base.to_ascii_lowercase().ends_with(".mp3") {
        base.to_string()
    } else {
        format!("{base}.mp3")
    }
}

pub struct ConverterSession {
    job: ConversionJob,
    media: Arc<dyn MediaService>,
    player: Box<dyn PlaybackBackend>,
    settings: Box<dyn SettingsStore>,
    export_settings: ExportSettings,
    info: Option<MediaInfo>,
    preview: PreviewView,
    playback_warning: Option<String>,
    exporting: bool,
}

impl ConverterSession {
    /// Creates a session, restoring the last output directory if it still exists.
    pub fn new(
        media: Arc<dyn MediaService>,
        player: Box<dyn PlaybackBackend>,
        settings: Box<dyn SettingsStore>,
        export_settings: ExportSettings,
    ) -> Self {
        let mut job = ConversionJob::new(default_file_name(&export_settings.file_name_prefix));
        job.output_dir = settings.last_output_dir().filter(|dir| dir.is_dir());
        if let Some(dir) = &job.output_dir {
            tracing::debug!("Restored output directory {}", dir.display());
        }

        Self {
            job,
            media,
            player,
            settings,
            export_settings,
            info: None,
            preview: PreviewView::default(),
            playback_warning: None,
            exporting: false,
        }
    }

    pub fn job(&self) -> &ConversionJob {
        &self.job
    }

    pub fn media(&self) -> Arc<dyn MediaService> {
        Arc::clone(&self.media)
    }

    pub fn preview(&self) -> &PreviewView {
        &self.preview
    }

    /// Info line for the loaded file, e.g. `Duration 00:10.000, size 1.20 MB`.
    pub fn info_text(&self) -> Option<String> {
        self.info.as_ref().map(MediaInfo::summary)
    }

    /// `mm:ss.zzz / mm:ss.zzz` for the preview playhead.
    pub fn position_label(&self) -> String {
        timecode::position_label(self.preview.position_ms, self.preview.duration_ms)
    }

    /// Export is possible iff both input and output are chosen and nothing is running.
    pub fn export_enabled(&self) -> bool {
        self.job.input_path.is_some() && self.job.output_dir.is_some() && !self.exporting
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Takes the pending preview warning, if any, so it is shown once.
    pub fn take_playback_warning(&mut self) -> Option<String> {
        self.playback_warning.take()
    }

    // Input selection

    /// Asks `picker` for a video, starting in the last input directory, and loads it.
    ///
    /// Returns `Ok(false)` when the user cancels.
    ///
    /// # Errors
    /// - `FileRead` if the chosen file cannot be probed
    pub fn select_input_file(&mut self, picker: &mut dyn FilePicker) -> Result<bool, ConverterError> {
        let initial = self.settings.last_input_dir();
        match picker.pick_input_file(initial.as_deref(), VIDEO_EXTENSIONS) {
            Some(path) => self.load_input(&path).map(|_| true),
            None => {
                tracing::debug!("Input selection cancelled");
                Ok(false)
            }
        }
    }

    /// Makes `path` the input, probes it and resets the range.
    ///
    /// The path stays selected even when probing fails; a preview failure is
    /// recorded as a warning and does not fail the call.
    ///
    /// # Errors
    /// - `FileRead` if the file cannot be probed
    pub fn load_input(&mut self, path: &Path) -> Result<(), ConverterError> {
        tracing::info!("Selected input {}", path.display());
        self.job.input_path = Some(path.to_path_buf());

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = self.settings.set_last_input_dir(dir) {
                tracing::warn!("{}", e);
            }
        }

        let info = self.media.probe(path).map_err(|e| {
            tracing::error!("Probe failed for {}: {}", path.display(), e);
            match e {
                ConverterError::FileRead(_) => e,
                other => ConverterError::FileRead(other.to_string()),
            }
        })?;

        self.job.duration_secs = info.duration_secs;
        self.job.range_start = 0.0;
        self.job.range_end = (info.duration_secs - self.export_settings.tail_trim_secs).max(0.0);
        self.info = Some(info);

        let duration_ms = timecode::secs_to_millis(self.job.duration_secs);
        self.preview = PreviewView {
            duration_ms,
            ..PreviewView::default()
        };
        match self.player.load(path, duration_ms) {
            Ok(()) => {
                self.preview.available = true;
                self.pump_playback();
            }
            Err(e) => {
                tracing::warn!("Preview load failed: {}", e);
                self.playback_warning = Some(e.to_string());
            }
        }

        Ok(())
    }

    // Playback control

    /// Drains the playback backend and applies its events.
    pub fn pump_playback(&mut self) {
        for event in self.player.poll_events() {
            self.handle_playback_event(event);
        }
    }

    /// Applies one playback notification. Never issues a command back to the player.
    pub fn handle_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::DurationChanged(ms) => {
                self.preview.duration_ms = ms;
                self.preview.position_ms = self.preview.position_ms.min(ms);
            }
            PlaybackEvent::PositionChanged(ms) => {
                self.preview.position_ms = ms.min(self.preview.duration_ms);
            }
            PlaybackEvent::StateChanged(state) => {
                self.preview.state = state;
            }
            PlaybackEvent::Error(message) => {
                tracing::warn!("Playback error: {}", message);
                self.playback_warning = Some(message);
            }
        }
    }

    pub fn toggle_play(&mut self) {
        if !self.preview.available {
            return;
        }
        if self.player.state() == PlaybackState::Playing {
            self.player.pause();
        } else if let Err(e) = self.player.play() {
            tracing::warn!("Failed to start preview: {}", e);
            self.playback_warning = Some(e.to_string());
        }
        self.pump_playback();
    }

    pub fn seek(&mut self, position_ms: u64) {
        if !self.preview.available {
            return;
        }
        let target = position_ms.min(self.preview.duration_ms);
        self.preview.position_ms = target;
        self.player.seek(target);
        self.pump_playback();
    }

    /// Seeks relative to the current playhead.
    pub fn seek_by(&mut self, delta_ms: i64) {
        let target = self.preview.position_ms.saturating_add_signed(delta_ms);
        self.seek(target);
    }

    /// Seeks to the point of the scrub bar under a click at `click_x` of `track_width`.
    pub fn scrub_click(&mut self, click_x: u16, track_width: u16) {
        if self.preview.duration_ms == 0 || track_width == 0 {
            return;
        }
        let ratio = f64::from(click_x) / f64::from(track_width);
        let target = (ratio * self.preview.duration_ms as f64) as u64;
        self.seek(target);
    }

    // Range and name editing

    fn clamp_to_duration(&self, secs: f64) -> f64 {
        let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        if self.job.duration_secs > 0.0 {
            secs.min(self.job.duration_secs)
        } else {
            secs
        }
    }

    pub fn set_range_start(&mut self, secs: f64) {
        self.job.range_start = self.clamp_to_duration(secs);
    }

    pub fn set_range_end(&mut self, secs: f64) {
        self.job.range_end = self.clamp_to_duration(secs);
    }

    /// Sets the range start to the current preview position.
    pub fn mark_start(&mut self) {
        self.set_range_start(self.preview.position_ms as f64 / 1000.0);
    }

    /// Sets the range end to the current preview position.
    pub fn mark_end(&mut self) {
        self.set_range_end(self.preview.position_ms as f64 / 1000.0);
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.job.file_name = name.into();
    }

    // Output selection

    /// Asks `picker` for an output directory, starting in the last one used.
    ///
    /// Returns `Ok(false)` when the user cancels.
    ///
    /// # Errors
    /// - `Validation` if the directory cannot be created
    pub fn select_output_folder(&mut self, picker: &mut dyn FilePicker) -> Result<bool, ConverterError> {
        let initial = self
            .job
            .output_dir
            .clone()
            .or_else(|| self.settings.last_output_dir());
        match picker.pick_output_dir(initial.as_deref()) {
            Some(dir) => self.set_output_dir(&dir).map(|_| true),
            None => {
                tracing::debug!("Output selection cancelled");
                Ok(false)
            }
        }
    }

    /// Makes `dir` the output directory, creating it if needed, and remembers it.
    ///
    /// # Errors
    /// - `Validation` if the directory cannot be created
    pub fn set_output_dir(&mut self, dir: &Path) -> Result<(), ConverterError> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                ConverterError::validation(format!("Cannot create {}: {e}", dir.display()))
            })?;
            tracing::info!("Created output directory {}", dir.display());
        } else if !dir.is_dir() {
            return Err(ConverterError::validation(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        self.job.output_dir = Some(dir.to_path_buf());
        if let Err(e) = self.settings.set_last_output_dir(dir) {
            tracing::warn!("{}", e);
        }
        tracing::info!("Selected output directory {}", dir.display());
        Ok(())
    }

    // Export

    /// Output path the next export would write to.
    pub fn resolved_output_path(&self) -> Option<PathBuf> {
        let dir = self.job.output_dir.as_ref()?;
        let fallback = default_file_name(&self.export_settings.file_name_prefix);
        Some(dir.join(normalize_file_name(&self.job.file_name, &fallback)))
    }

    /// Validates the job, disables the trigger and returns the request to run.
    ///
    /// # Errors
    /// - `ExportInFlight` if an export is already running
    /// - `Validation` for a missing selection or an invalid range
    pub fn begin_export(&mut self) -> Result<ExportRequest, ConverterError> {
        if self.exporting {
            return Err(ConverterError::ExportInFlight);
        }
        let input = self
            .job
            .input_path
            .clone()
            .ok_or_else(|| ConverterError::validation("Select a video file first"))?;
        let output = self
            .resolved_output_path()
            .ok_or_else(|| ConverterError::validation("Select an output folder first"))?;

        if self.job.range_start >= self.job.range_end {
            return Err(ConverterError::validation("Start time must be before end time"));
        }
        if self.job.range_end > self.job.duration_secs {
            return Err(ConverterError::validation("End time exceeds the video duration"));
        }

        self.exporting = true;
        self.job.progress = 0;
        tracing::info!(
            "Export started: {} [{} - {}] -> {}",
            input.display(),
            timecode::format_secs(self.job.range_start),
            timecode::format_secs(self.job.range_end),
            output.display()
        );

        Ok(ExportRequest {
            input,
            output,
            start_secs: self.job.range_start,
            end_secs: self.job.range_end,
            settings: self.export_settings.clone(),
        })
    }

    /// Records export progress. Values never decrease and stay below 100 until
    /// [`Self::finish_export`] reports success.
    pub fn record_progress(&mut self, percent: u8) {
        if !self.exporting {
            return;
        }
        let capped = percent.min(99);
        if capped > self.job.progress {
            self.job.progress = capped;
        }
    }

    /// Ends the running export and re-enables the trigger.
    ///
    /// Progress becomes 100 only on success.
    pub fn finish_export(
        &mut self,
        result: Result<PathBuf, ConverterError>,
    ) -> Result<PathBuf, ConverterError> {
        self.exporting = false;
        match result {
            Ok(path) => {
                self.job.progress = 100;
                tracing::info!("Export finished: {}", path.display());
                Ok(path)
            }
            Err(e) => {
                tracing::error!("Export failed: {}", e);
                Err(match e {
                    ConverterError::Export(_) => e,
                    other => ConverterError::Export(other.to_string()),
                })
            }
        }
    }

    /// Runs a complete export on the calling thread.
    ///
    /// `observer` sees every progress value the session records.
    ///
    /// # Errors
    /// - `ExportInFlight`, `Validation` before any media call
    /// - `Export` if the media service fails
    pub fn export_audio(&mut self, observer: &mut dyn FnMut(u8)) -> Result<PathBuf, ConverterError> {
        let request = self.begin_export()?;
        let media = Arc::clone(&self.media);
        let result = media.export_audio(&request, &mut |percent| {
            self.record_progress(percent);
            observer(self.job.progress);
        });
        let result = self.finish_export(result);
        if result.is_ok() {
            observer(self.job.progress);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ExportStage;
    use crate::playback::NullPlayer;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMedia {
        duration_secs: f64,
        fail_probe: bool,
        fail_export: Option<String>,
        probes: AtomicUsize,
        exports: Mutex<Vec<ExportRequest>>,
    }

    impl FakeMedia {
        fn with_duration(duration_secs: f64) -> Self {
            Self {
                duration_secs,
                ..Self::default()
            }
        }

        fn export_calls(&self) -> usize {
            self.exports.lock().unwrap().len()
        }
    }

    impl MediaService for FakeMedia {
        fn probe(&self, path: &Path) -> Result<MediaInfo, ConverterError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.fail_probe {
                return Err(ConverterError::FileRead("moov atom not found".to_string()));
            }
            Ok(MediaInfo {
                path: path.to_path_buf(),
                duration_secs: self.duration_secs,
                size_bytes: 1024 * 1024,
            })
        }

        fn export_audio(
            &self,
            request: &ExportRequest,
            progress: &mut dyn FnMut(u8),
        ) -> Result<PathBuf, ConverterError> {
            self.exports.lock().unwrap().push(request.clone());
            progress(ExportStage::Opened.percent());
            progress(ExportStage::RangeExtracted.percent());
            // out-of-order report must not move progress backwards
            progress(5);
            progress(ExportStage::AudioExtracted.percent());
            progress(ExportStage::FadeApplied.percent());
            if let Some(message) = &self.fail_export {
                return Err(ConverterError::Export(message.clone()));
            }
            progress(ExportStage::Encoded.percent());
            Ok(request.output.clone())
        }
    }

    #[derive(Default)]
    struct MemorySettings {
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    }

    impl SettingsStore for MemorySettings {
        fn last_input_dir(&self) -> Option<PathBuf> {
            self.input.clone()
        }

        fn last_output_dir(&self) -> Option<PathBuf> {
            self.output.clone()
        }

        fn set_last_input_dir(&mut self, dir: &Path) -> Result<(), ConverterError> {
            self.input = Some(dir.to_path_buf());
            Ok(())
        }

        fn set_last_output_dir(&mut self, dir: &Path) -> Result<(), ConverterError> {
            self.output = Some(dir.to_path_buf());
            Ok(())
        }
    }

    /// Picker returning queued answers and remembering the initial dirs it was given.
    #[derive(Default)]
    struct ScriptedPicker {
        files: VecDeque<Option<PathBuf>>,
        dirs: VecDeque<Option<PathBuf>>,
        seen_initial: Vec<Option<PathBuf>>,
    }

    impl FilePicker for ScriptedPicker {
        fn pick_input_file(&mut self, initial_dir: Option<&Path>, extensions: &[&str]) -> Option<PathBuf> {
            assert!(extensions.contains(&"mp4"));
            self.seen_initial.push(initial_dir.map(Path::to_path_buf));
            self.files.pop_front().flatten()
        }

        fn pick_output_dir(&mut self, initial_dir: Option<&Path>) -> Option<PathBuf> {
            self.seen_initial.push(initial_dir.map(Path::to_path_buf));
            self.dirs.pop_front().flatten()
        }
    }

    /// Player that records seeks so tests can check no feedback loop exists.
    #[derive(Default)]
    struct RecordingPlayer {
        seeks: Arc<Mutex<Vec<u64>>>,
        state: PlaybackState,
        fail_play: bool,
        events: Vec<PlaybackEvent>,
    }

    impl PlaybackBackend for RecordingPlayer {
        fn load(&mut self, _path: &Path, duration_ms: u64) -> Result<(), ConverterError> {
            self.events.push(PlaybackEvent::DurationChanged(duration_ms));
            Ok(())
        }

        fn play(&mut self) -> Result<(), ConverterError> {
            if self.fail_play {
                return Err(ConverterError::Playback("no decoder for h265".to_string()));
            }
            self.state = PlaybackState::Playing;
            self.events.push(PlaybackEvent::StateChanged(PlaybackState::Playing));
            Ok(())
        }

        fn pause(&mut self) {
            self.state = PlaybackState::Paused;
            self.events.push(PlaybackEvent::StateChanged(PlaybackState::Paused));
        }

        fn seek(&mut self, position_ms: u64) {
            self.seeks.lock().unwrap().push(position_ms);
            self.events.push(PlaybackEvent::PositionChanged(position_ms));
        }

        fn state(&self) -> PlaybackState {
            self.state
        }

        fn poll_events(&mut self) -> Vec<PlaybackEvent> {
            std::mem::take(&mut self.events)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        video: PathBuf,
        out_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("videos").join("clip.mp4");
        std::fs::create_dir_all(video.parent().unwrap()).unwrap();
        std::fs::write(&video, b"not really a video").unwrap();
        let out_dir = dir.path().join("music");
        Fixture {
            video,
            out_dir,
            _dir: dir,
        }
    }

    fn session_with(media: Arc<FakeMedia>) -> ConverterSession {
        ConverterSession::new(
            media,
            Box::new(NullPlayer::new()),
            Box::<MemorySettings>::default(),
            ExportSettings::default(),
        )
    }

    fn ready_session(duration: f64) -> (Fixture, Arc<FakeMedia>, ConverterSession) {
        let fx = fixture();
        let media = Arc::new(FakeMedia::with_duration(duration));
        let mut session = session_with(Arc::clone(&media));
        session.load_input(&fx.video).unwrap();
        session.set_output_dir(&fx.out_dir).unwrap();
        (fx, media, session)
    }

    #[test]
    fn test_load_sets_default_range() {
        for (duration, expected_end) in [(10.0, 7.0), (3.0, 0.0), (1.2, 0.0), (125.5, 122.5)] {
            let fx = fixture();
            let mut session = session_with(Arc::new(FakeMedia::with_duration(duration)));
            session.set_range_start(0.5);
            session.load_input(&fx.video).unwrap();
            assert_eq!(session.job().range_start, 0.0);
            assert!((session.job().range_end - expected_end).abs() < 1e-9);
            assert_eq!(session.job().duration_secs, duration);
        }
    }

    #[test]
    fn test_load_updates_info_and_preview() {
        let fx = fixture();
        let mut session = session_with(Arc::new(FakeMedia::with_duration(10.0)));
        session.load_input(&fx.video).unwrap();
        assert_eq!(
            session.info_text().as_deref(),
            Some("Duration 00:10.000, size 1.00 MB")
        );
        assert_eq!(session.preview().duration_ms, 10_000);
        assert!(session.preview().available);
        assert_eq!(session.position_label(), "00:00.000 / 00:10.000");
    }

    #[test]
    fn test_probe_failure_keeps_path_and_range() {
        let fx = fixture();
        let media = Arc::new(FakeMedia {
            fail_probe: true,
            ..FakeMedia::default()
        });
        let mut session = session_with(media);
        session.set_range_end(4.0);

        let err = session.load_input(&fx.video).unwrap_err();
        assert!(matches!(err, ConverterError::FileRead(_)));
        assert_eq!(session.job().input_path.as_deref(), Some(fx.video.as_path()));
        assert_eq!(session.job().range_end, 4.0);
        assert_eq!(session.info_text(), None);
    }

    #[test]
    fn test_select_input_uses_last_dir_and_persists() {
        let fx = fixture();
        let mut session = session_with(Arc::new(FakeMedia::with_duration(10.0)));
        let mut picker = ScriptedPicker {
            files: VecDeque::from([Some(fx.video.clone()), None]),
            ..ScriptedPicker::default()
        };

        assert!(session.select_input_file(&mut picker).unwrap());
        assert!(!session.select_input_file(&mut picker).unwrap());

        assert_eq!(picker.seen_initial[0], None);
        assert_eq!(picker.seen_initial[1].as_deref(), fx.video.parent());
        assert_eq!(session.job().input_path.as_deref(), Some(fx.video.as_path()));
    }

    #[test]
    fn test_preview_failure_does_not_block_export() {
        let fx = fixture();
        let mut session = ConverterSession::new(
            Arc::new(FakeMedia::with_duration(10.0)),
            Box::new(RecordingPlayer {
                fail_play: true,
                ..RecordingPlayer::default()
            }),
            Box::<MemorySettings>::default(),
            ExportSettings::default(),
        );
        session.load_input(&fx.video).unwrap();
        session.set_output_dir(&fx.out_dir).unwrap();

        session.toggle_play();
        assert!(session.take_playback_warning().is_some());
        assert!(session.take_playback_warning().is_none());
        assert!(session.export_enabled());

        session.handle_playback_event(PlaybackEvent::Error("codec not found".into()));
        assert!(session.export_enabled());
    }

    #[test]
    fn test_export_enabled_in_either_order() {
        let fx = fixture();
        let mut a = session_with(Arc::new(FakeMedia::with_duration(10.0)));
        assert!(!a.export_enabled());
        a.load_input(&fx.video).unwrap();
        assert!(!a.export_enabled());
        a.set_output_dir(&fx.out_dir).unwrap();
        assert!(a.export_enabled());

        let mut b = session_with(Arc::new(FakeMedia::with_duration(10.0)));
        b.set_output_dir(&fx.out_dir).unwrap();
        assert!(!b.export_enabled());
        b.load_input(&fx.video).unwrap();
        assert!(b.export_enabled());
    }

    #[test]
    fn test_output_folder_created_and_remembered() {
        let fx = fixture();
        let nested = fx.out_dir.join("a").join("b");
        let mut session = session_with(Arc::new(FakeMedia::with_duration(10.0)));
        let mut picker = ScriptedPicker {
            dirs: VecDeque::from([Some(nested.clone())]),
            ..ScriptedPicker::default()
        };

        assert!(session.select_output_folder(&mut picker).unwrap());
        assert!(nested.is_dir());
        assert_eq!(session.job().output_dir.as_deref(), Some(nested.as_path()));
        assert_eq!(session.settings.last_output_dir().as_deref(), Some(nested.as_path()));
    }

    #[test]
    fn test_restores_existing_output_dir_only() {
        let fx = fixture();
        std::fs::create_dir_all(&fx.out_dir).unwrap();

        let existing = ConverterSession::new(
            Arc::new(FakeMedia::default()),
            Box::new(NullPlayer::new()),
            Box::new(MemorySettings {
                output: Some(fx.out_dir.clone()),
                ..MemorySettings::default()
            }),
            ExportSettings::default(),
        );
        assert_eq!(existing.job().output_dir.as_deref(), Some(fx.out_dir.as_path()));

        let gone = ConverterSession::new(
            Arc::new(FakeMedia::default()),
            Box::new(NullPlayer::new()),
            Box::new(MemorySettings {
                output: Some(fx.out_dir.join("deleted")),
                ..MemorySettings::default()
            }),
            ExportSettings::default(),
        );
        assert_eq!(gone.job().output_dir, None);
    }

    #[test]
    fn test_invalid_ranges_make_no_media_calls() {
        let (_fx, media, mut session) = ready_session(10.0);

        session.job.range_start = 5.0;
        session.job.range_end = 5.0;
        assert!(matches!(
            session.export_audio(&mut |_| {}),
            Err(ConverterError::Validation(_))
        ));

        session.job.range_start = 6.0;
        session.job.range_end = 2.0;
        assert!(matches!(
            session.export_audio(&mut |_| {}),
            Err(ConverterError::Validation(_))
        ));

        session.job.range_start = 0.0;
        session.job.range_end = 10.5;
        assert!(matches!(
            session.export_audio(&mut |_| {}),
            Err(ConverterError::Validation(_))
        ));

        assert_eq!(media.export_calls(), 0);
        assert!(!session.is_exporting());
        assert!(session.export_enabled());
    }

    #[test]
    fn test_short_video_default_range_is_rejected() {
        let (_fx, media, mut session) = ready_session(2.0);
        assert!(matches!(
            session.export_audio(&mut |_| {}),
            Err(ConverterError::Validation(_))
        ));
        assert_eq!(media.export_calls(), 0);
    }

    #[test]
    fn test_export_request_carries_fade_in_tail() {
        let (fx, media, mut session) = ready_session(10.0);
        let path = session.export_audio(&mut |_| {}).unwrap();

        let requests = media.exports.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.start_secs, 0.0);
        assert_eq!(request.end_secs, 7.0);
        assert_eq!(request.clip_secs(), 7.0);
        assert_eq!(request.fade_start_secs(), 6.5);
        assert_eq!(request.fade_secs(), 0.5);
        assert_eq!(request.settings.bitrate_kbps, 320);
        assert_eq!(path.parent(), Some(fx.out_dir.as_path()));
    }

    #[test]
    fn test_file_name_normalization() {
        assert_eq!(normalize_file_name("clip", "x"), "clip.mp3");
        assert_eq!(normalize_file_name("clip.mp3", "x"), "clip.mp3");
        assert_eq!(normalize_file_name("  Clip.MP3 ", "x"), "Clip.MP3");
        assert_eq!(normalize_file_name("song.wav", "x"), "song.wav.mp3");
        assert_eq!(normalize_file_name("   ", "fallback"), "fallback.mp3");
    }

    #[test]
    fn test_export_uses_normalized_name() {
        let (fx, _media, mut session) = ready_session(10.0);
        session.set_file_name("clip");
        let path = session.export_audio(&mut |_| {}).unwrap();
        assert_eq!(path, fx.out_dir.join("clip.mp3"));

        session.set_file_name("clip.mp3");
        let path = session.export_audio(&mut |_| {}).unwrap();
        assert_eq!(path, fx.out_dir.join("clip.mp3"));
    }

    #[test]
    fn test_default_file_name_has_prefix_and_timestamp() {
        let name = default_file_name("clip_");
        assert!(name.starts_with("clip_"));
        assert_eq!(name.len(), "clip_".len() + "MMDD_HHMMSS".len());
    }

    #[test]
    fn test_progress_monotonic_and_complete_on_success() {
        let (_fx, _media, mut session) = ready_session(10.0);
        let mut seen = Vec::new();
        session.export_audio(&mut |p| seen.push(p)).unwrap();

        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(seen.iter().filter(|&&p| p == 100).count(), 1);
        assert_eq!(session.job().progress, 100);
        assert!(session.export_enabled());
    }

    #[test]
    fn test_failed_export_never_reports_100() {
        let fx = fixture();
        let media = Arc::new(FakeMedia {
            duration_secs: 10.0,
            fail_export: Some("No space left on device".to_string()),
            ..FakeMedia::default()
        });
        let mut session = session_with(Arc::clone(&media));
        session.load_input(&fx.video).unwrap();
        session.set_output_dir(&fx.out_dir).unwrap();

        let mut seen = Vec::new();
        let err = session.export_audio(&mut |p| seen.push(p)).unwrap_err();

        assert_eq!(err, ConverterError::Export("No space left on device".to_string()));
        assert!(seen.iter().all(|&p| p < 100));
        assert!(session.job().progress < 100);
        assert!(session.export_enabled(), "trigger must be re-enabled");
    }

    #[test]
    fn test_progress_resets_for_each_export() {
        let (_fx, _media, mut session) = ready_session(10.0);
        session.export_audio(&mut |_| {}).unwrap();
        assert_eq!(session.job().progress, 100);

        session.begin_export().unwrap();
        assert_eq!(session.job().progress, 0);
    }

    #[test]
    fn test_second_export_rejected_while_in_flight() {
        let (_fx, media, mut session) = ready_session(10.0);
        let request = session.begin_export().unwrap();
        assert!(!session.export_enabled());

        assert_eq!(session.begin_export(), Err(ConverterError::ExportInFlight));
        assert_eq!(
            session.export_audio(&mut |_| {}),
            Err(ConverterError::ExportInFlight)
        );
        assert_eq!(media.export_calls(), 0);

        session.record_progress(100);
        assert_eq!(session.job().progress, 99);
        session.finish_export(Ok(request.output)).unwrap();
        assert!(session.export_enabled());
    }

    #[test]
    fn test_progress_ignored_when_idle() {
        let (_fx, _media, mut session) = ready_session(10.0);
        session.record_progress(50);
        assert_eq!(session.job().progress, 0);
    }

    #[test]
    fn test_position_events_never_seek() {
        let fx = fixture();
        let seeks = Arc::new(Mutex::new(Vec::new()));
        let mut session = ConverterSession::new(
            Arc::new(FakeMedia::with_duration(10.0)),
            Box::new(RecordingPlayer {
                seeks: Arc::clone(&seeks),
                ..RecordingPlayer::default()
            }),
            Box::<MemorySettings>::default(),
            ExportSettings::default(),
        );
        session.load_input(&fx.video).unwrap();

        for ms in [100, 2_000, 9_999, 20_000] {
            session.handle_playback_event(PlaybackEvent::PositionChanged(ms));
        }
        assert!(seeks.lock().unwrap().is_empty());
        assert_eq!(session.preview().position_ms, 10_000);
        assert_eq!(session.position_label(), "00:10.000 / 00:10.000");
    }

    #[test]
    fn test_duration_event_rebinds_scrub_range() {
        let (_fx, _media, mut session) = ready_session(10.0);
        session.handle_playback_event(PlaybackEvent::PositionChanged(9_000));
        session.handle_playback_event(PlaybackEvent::DurationChanged(8_000));
        assert_eq!(session.preview().duration_ms, 8_000);
        assert_eq!(session.preview().position_ms, 8_000);
    }

    #[test]
    fn test_scrub_click_seeks_proportionally() {
        let fx = fixture();
        let seeks = Arc::new(Mutex::new(Vec::new()));
        let mut session = ConverterSession::new(
            Arc::new(FakeMedia::with_duration(10.0)),
            Box::new(RecordingPlayer {
                seeks: Arc::clone(&seeks),
                ..RecordingPlayer::default()
            }),
            Box::<MemorySettings>::default(),
            ExportSettings::default(),
        );

        session.scrub_click(10, 40);
        assert!(seeks.lock().unwrap().is_empty(), "no media, no seek");

        session.load_input(&fx.video).unwrap();
        session.scrub_click(10, 40);
        session.scrub_click(40, 40);
        session.scrub_click(0, 0);
        assert_eq!(*seeks.lock().unwrap(), vec![2_500, 10_000]);
        assert_eq!(session.preview().position_ms, 10_000);
    }

    #[test]
    fn test_toggle_play_follows_player_state() {
        let fx = fixture();
        let mut session = ConverterSession::new(
            Arc::new(FakeMedia::with_duration(10.0)),
            Box::new(RecordingPlayer::default()),
            Box::<MemorySettings>::default(),
            ExportSettings::default(),
        );
        session.load_input(&fx.video).unwrap();

        session.toggle_play();
        assert_eq!(session.preview().state, PlaybackState::Playing);
        session.toggle_play();
        assert_eq!(session.preview().state, PlaybackState::Paused);
    }

    #[test]
    fn test_mark_range_from_playhead() {
        let (_fx, _media, mut session) = ready_session(10.0);
        session.seek(2_250);
        session.mark_start();
        session.seek_by(3_000);
        session.mark_end();
        assert_eq!(session.job().range_start, 2.25);
        assert_eq!(session.job().range_end, 5.25);

        session.seek_by(-60_000);
        assert_eq!(session.preview().position_ms, 0);
    }

    #[test]
    fn test_range_edits_are_clamped() {
        let (_fx, _media, mut session) = ready_session(10.0);
        session.set_range_start(-4.0);
        session.set_range_end(42.0);
        assert_eq!(session.job().range_start, 0.0);
        assert_eq!(session.job().range_end, 10.0);
    }
}
