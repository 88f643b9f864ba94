//! Preview through an `ffplay` child process.
//!
//! ffplay opens its own video window. It has no control channel, so pausing
//! or seeking stops the child and a later play restarts it with `-ss` at the
//! remembered position. While playing, the position comes from a monotonic
//! clock started when the child was spawned.
//!
//! ffplay exits with status 0 even when it cannot decode the input, so any
//! stderr output on exit is reported as a playback error.

use super::{PlaybackBackend, PlaybackEvent, PlaybackState};
use crate::error::ConverterError;
use crate::media::ffmpeg::find_tool;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Minimum wall time between two position reports while playing.
const POSITION_INTERVAL: Duration = Duration::from_millis(50);

/// Number of stderr characters kept for error reports.
const STDERR_TAIL: usize = 400;

/// Slack for player startup when deciding whether a clean exit reached the end.
const END_TOLERANCE_MS: u64 = 500;

pub struct FfplayPlayer {
    /// Player binary name or path
    player: String,
    /// `player` resolved on first use
    player_path: Option<PathBuf>,
    media: Option<PathBuf>,
    duration_ms: u64,
    state: PlaybackState,
    child: Option<Child>,
    /// Position at the moment the current child was started (or of the pause)
    base_position_ms: u64,
    started_at: Option<Instant>,
    last_report: Option<Instant>,
    events: Vec<PlaybackEvent>,
}

impl FfplayPlayer {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            player_path: None,
            media: None,
            duration_ms: 0,
            state: PlaybackState::Stopped,
            child: None,
            base_position_ms: 0,
            started_at: None,
            last_report: None,
            events: Vec::new(),
        }
    }

    /// Current playhead, advancing with wall time while playing.
    pub fn position_ms(&self) -> u64 {
        let elapsed = match (self.state, self.started_at) {
            (PlaybackState::Playing, Some(started)) => started.elapsed().as_millis() as u64,
            _ => 0,
        };
        (self.base_position_ms + elapsed).min(self.duration_ms)
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.events.push(PlaybackEvent::StateChanged(state));
        }
    }

    fn resolve_player(&mut self) -> Result<PathBuf, ConverterError> {
        if let Some(path) = &self.player_path {
            return Ok(path.clone());
        }
        let path = find_tool(&self.player).map_err(|e| ConverterError::Playback(e.to_string()))?;
        self.player_path = Some(path.clone());
        Ok(path)
    }

    fn spawn_child(&mut self) -> Result<(), ConverterError> {
        let player = self.resolve_player()?;
        let media = self
            .media
            .clone()
            .ok_or_else(|| ConverterError::Playback("no video loaded".to_string()))?;

        let title = media
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clipmp3".to_string());

        let child = Command::new(&player)
            .args(["-hide_banner", "-nostats", "-loglevel", "error", "-autoexit"])
            .arg("-ss")
            .arg(format!("{:.3}", self.base_position_ms as f64 / 1000.0))
            .arg("-window_title")
            .arg(title)
            .arg(&media)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConverterError::Playback(format!("Failed to start {}: {e}", self.player)))?;

        tracing::debug!(
            "Started {} (pid {}) at {}ms",
            self.player,
            child.id(),
            self.base_position_ms
        );
        self.child = Some(child);
        self.started_at = Some(Instant::now());
        self.last_report = None;
        Ok(())
    }

    /// Stops the running child, if any, without reporting its exit.
    fn stop_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!("Player already exited: {}", e);
            }
            let _ = child.wait();
        }
        self.started_at = None;
    }

    /// Checks whether the child exited on its own.
    fn reap_child(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };

        let status = match child.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to poll player: {}", e);
                return;
            }
        };

        let mut stderr_text = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_string(&mut stderr_text);
        }
        let elapsed_ms = self
            .started_at
            .map_or(0, |started| started.elapsed().as_millis() as u64);
        let stopped_at = self.position_ms();
        self.child = None;
        self.started_at = None;

        let stderr_text = stderr_text.trim();
        if !status.success() || !stderr_text.is_empty() {
            let message = if stderr_text.is_empty() {
                format!("{} exited with status {status}", self.player)
            } else {
                tail(stderr_text, STDERR_TAIL)
            };
            tracing::warn!("Preview failed: {}", message);
            self.events.push(PlaybackEvent::Error(message));
            self.events
                .push(PlaybackEvent::PositionChanged(self.base_position_ms));
        } else if reached_end(elapsed_ms, self.base_position_ms, self.duration_ms) {
            tracing::debug!("Preview reached the end");
            self.base_position_ms = self.duration_ms;
            self.events.push(PlaybackEvent::PositionChanged(self.duration_ms));
        } else {
            // Window closed by the user
            tracing::debug!("Player closed at {}ms", stopped_at);
            self.base_position_ms = stopped_at;
            self.events.push(PlaybackEvent::PositionChanged(stopped_at));
        }
        self.set_state(PlaybackState::Stopped);
    }
}

impl PlaybackBackend for FfplayPlayer {
    fn load(&mut self, path: &Path, duration_ms: u64) -> Result<(), ConverterError> {
        self.stop_child();
        if !path.is_file() {
            return Err(ConverterError::Playback(format!(
                "{} is not a file",
                path.display()
            )));
        }

        self.media = Some(path.to_path_buf());
        self.duration_ms = duration_ms;
        self.base_position_ms = 0;
        self.events.push(PlaybackEvent::DurationChanged(duration_ms));
        self.events.push(PlaybackEvent::PositionChanged(0));
        self.set_state(PlaybackState::Paused);
        tracing::info!("Loaded {} for preview", path.display());
        Ok(())
    }

    fn play(&mut self) -> Result<(), ConverterError> {
        if self.state == PlaybackState::Playing {
            return Ok(());
        }
        if self.base_position_ms >= self.duration_ms {
            self.base_position_ms = 0;
        }
        self.spawn_child()?;
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.base_position_ms = self.position_ms();
        self.stop_child();
        self.events
            .push(PlaybackEvent::PositionChanged(self.base_position_ms));
        self.set_state(PlaybackState::Paused);
    }

    fn seek(&mut self, position_ms: u64) {
        let target = position_ms.min(self.duration_ms);
        let was_playing = self.state == PlaybackState::Playing;

        self.stop_child();
        self.base_position_ms = target;
        self.events.push(PlaybackEvent::PositionChanged(target));

        if was_playing {
            if let Err(e) = self.spawn_child() {
                self.events.push(PlaybackEvent::Error(e.to_string()));
                self.set_state(PlaybackState::Stopped);
            }
        }
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        self.reap_child();

        if self.state == PlaybackState::Playing {
            let due = self
                .last_report
                .map_or(true, |last| last.elapsed() >= POSITION_INTERVAL);
            if due {
                self.events.push(PlaybackEvent::PositionChanged(self.position_ms()));
                self.last_report = Some(Instant::now());
            }
        }

        std::mem::take(&mut self.events)
    }
}

impl Drop for FfplayPlayer {
    fn drop(&mut self) {
        self.stop_child();
    }
}

/// True if `elapsed_ms` of playback from `start_ms` covers the rest of the media.
fn reached_end(elapsed_ms: u64, start_ms: u64, duration_ms: u64) -> bool {
    elapsed_ms + END_TOLERANCE_MS >= duration_ms.saturating_sub(start_ms)
}

/// Last `max_chars` characters of `text`.
fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_player(duration_ms: u64) -> (tempfile::NamedTempFile, FfplayPlayer) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut player = FfplayPlayer::new("clipmp3-missing-player");
        player.load(file.path(), duration_ms).unwrap();
        (file, player)
    }

    #[test]
    fn test_load_reports_duration_and_pauses() {
        let (_file, mut player) = loaded_player(8_000);
        let events = player.poll_events();
        assert_eq!(events[0], PlaybackEvent::DurationChanged(8_000));
        assert!(events.contains(&PlaybackEvent::StateChanged(PlaybackState::Paused)));
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut player = FfplayPlayer::new("ffplay");
        let err = player.load(&dir.path().join("nope.mp4"), 1_000).unwrap_err();
        assert!(matches!(err, ConverterError::Playback(_)));
    }

    #[test]
    fn test_seek_while_paused_moves_playhead_only() {
        let (_file, mut player) = loaded_player(8_000);
        player.poll_events();
        player.seek(3_000);
        assert_eq!(player.position_ms(), 3_000);
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.poll_events(), vec![PlaybackEvent::PositionChanged(3_000)]);
    }

    #[test]
    fn test_seek_is_clamped_to_duration() {
        let (_file, mut player) = loaded_player(8_000);
        player.seek(60_000);
        assert_eq!(player.position_ms(), 8_000);
    }

    #[test]
    fn test_missing_player_binary_is_playback_error() {
        let (_file, mut player) = loaded_player(8_000);
        let err = player.play().unwrap_err();
        assert!(matches!(err, ConverterError::Playback(_)));
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_reached_end_allows_startup_slack() {
        assert!(reached_end(2_000, 0, 2_000));
        assert!(reached_end(1_600, 0, 2_000));
        assert!(reached_end(0, 8_000, 8_000));
        assert!(!reached_end(300, 0, 60_000));
        assert!(!reached_end(1_000, 5_000, 10_000));
    }

    #[cfg(unix)]
    mod child_exit {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes an executable shell script standing in for the player.
        fn stub_player(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("player.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        /// Plays until the child exits and returns every event seen after `play`.
        fn play_until_stopped(player: &str, duration_ms: u64) -> (FfplayPlayer, Vec<PlaybackEvent>) {
            let video = tempfile::NamedTempFile::new().unwrap();
            let mut ffplay = FfplayPlayer::new(player);
            ffplay.load(video.path(), duration_ms).unwrap();
            ffplay.poll_events();
            ffplay.play().unwrap();

            let mut events = Vec::new();
            for _ in 0..300 {
                events.extend(ffplay.poll_events());
                if ffplay.state() == PlaybackState::Stopped {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            (ffplay, events)
        }

        #[test]
        fn test_stderr_on_clean_exit_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let player = stub_player(
                dir.path(),
                "echo 'clip.mp4: Invalid data found when processing input' >&2\nexit 0",
            );

            let (ffplay, events) = play_until_stopped(player.to_str().unwrap(), 60_000);

            assert!(events.contains(&PlaybackEvent::Error(
                "clip.mp4: Invalid data found when processing input".to_string()
            )));
            assert!(!events.contains(&PlaybackEvent::PositionChanged(60_000)));
            assert_eq!(events.last(), Some(&PlaybackEvent::StateChanged(PlaybackState::Stopped)));
            assert_eq!(ffplay.position_ms(), 0);
        }

        #[test]
        fn test_failing_exit_without_output_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let player = stub_player(dir.path(), "exit 1");

            let (_ffplay, events) = play_until_stopped(player.to_str().unwrap(), 60_000);

            assert!(events
                .iter()
                .any(|e| matches!(e, PlaybackEvent::Error(m) if m.contains("exited with status"))));
        }

        #[test]
        fn test_playing_to_the_end_moves_playhead_to_duration() {
            let dir = tempfile::tempdir().unwrap();
            let player = stub_player(dir.path(), "sleep 0.3\nexit 0");

            let (ffplay, events) = play_until_stopped(player.to_str().unwrap(), 200);

            assert!(events.iter().all(|e| !matches!(e, PlaybackEvent::Error(_))));
            assert!(events.contains(&PlaybackEvent::PositionChanged(200)));
            assert_eq!(events.last(), Some(&PlaybackEvent::StateChanged(PlaybackState::Stopped)));
            assert_eq!(ffplay.position_ms(), 200);
        }

        #[test]
        fn test_closing_the_window_early_keeps_position() {
            let dir = tempfile::tempdir().unwrap();
            let player = stub_player(dir.path(), "exit 0");

            let (ffplay, events) = play_until_stopped(player.to_str().unwrap(), 60_000);

            assert!(events.iter().all(|e| !matches!(e, PlaybackEvent::Error(_))));
            assert!(!events.contains(&PlaybackEvent::PositionChanged(60_000)));
            assert_eq!(ffplay.state(), PlaybackState::Stopped);
            assert!(ffplay.position_ms() < 60_000);
        }
    }

    #[test]
    fn test_tail_keeps_last_chars() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }
}
