//! Preview playback.
//!
//! Backends report what happened as [`PlaybackEvent`]s which the UI loop drains
//! with [`PlaybackBackend::poll_events`] and hands to the session. The session
//! never depends on a particular player.

pub mod ffplay;

use crate::error::ConverterError;
use std::path::Path;

pub use ffplay::FfplayPlayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Notifications emitted by a playback backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Media length in milliseconds
    DurationChanged(u64),
    /// Current playhead in milliseconds
    PositionChanged(u64),
    StateChanged(PlaybackState),
    /// The player failed; preview only, never fatal
    Error(String),
}

/// A player the converter can drive for previewing the selected video.
pub trait PlaybackBackend {
    /// Loads `path` for preview, paused at the start.
    ///
    /// # Errors
    /// - `Playback` if the media cannot be previewed
    fn load(&mut self, path: &Path, duration_ms: u64) -> Result<(), ConverterError>;

    /// Starts or resumes playback from the current position.
    ///
    /// # Errors
    /// - `Playback` if the player cannot be started
    fn play(&mut self) -> Result<(), ConverterError>;

    fn pause(&mut self);

    /// Moves the playhead to `position_ms`, keeping the play/pause state.
    fn seek(&mut self, position_ms: u64);

    fn state(&self) -> PlaybackState;

    /// Drains the events produced since the last call.
    fn poll_events(&mut self) -> Vec<PlaybackEvent>;
}

/// Backend with no visual output, used by the headless commands.
///
/// It only tracks position and echoes events, so the session behaves the same
/// whether or not a preview is available.
#[derive(Debug, Default)]
pub struct NullPlayer {
    state: PlaybackState,
    duration_ms: u64,
    events: Vec<PlaybackEvent>,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackBackend for NullPlayer {
    fn load(&mut self, _path: &Path, duration_ms: u64) -> Result<(), ConverterError> {
        self.duration_ms = duration_ms;
        self.state = PlaybackState::Paused;
        self.events.push(PlaybackEvent::DurationChanged(duration_ms));
        self.events.push(PlaybackEvent::PositionChanged(0));
        Ok(())
    }

    fn play(&mut self) -> Result<(), ConverterError> {
        Err(ConverterError::Playback(
            "preview is not available in headless mode".to_string(),
        ))
    }

    fn pause(&mut self) {
        self.state = PlaybackState::Paused;
        self.events.push(PlaybackEvent::StateChanged(PlaybackState::Paused));
    }

    fn seek(&mut self, position_ms: u64) {
        self.events
            .push(PlaybackEvent::PositionChanged(position_ms.min(self.duration_ms)));
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }
}
