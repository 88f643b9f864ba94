//! Path prompts standing in for native file dialogs.

use super::converter::ConverterTui;
use crate::media::is_video_file;
use crate::session::FilePicker;
use std::path::{Path, PathBuf};

/// Expands a leading `~` to the home directory.
pub fn expand_home(input: &str) -> PathBuf {
    let input = input.trim();
    if input == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

/// Prefill for a prompt: the directory with a trailing separator, or empty.
fn initial_text(initial_dir: Option<&Path>) -> String {
    initial_dir
        .map(|dir| {
            let mut text = dir.display().to_string();
            if !text.ends_with(std::path::MAIN_SEPARATOR) {
                text.push(std::path::MAIN_SEPARATOR);
            }
            text
        })
        .unwrap_or_default()
}

pub fn validate_input_path(text: &str, extensions: &[&str]) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Enter the path of a video file".to_string());
    }
    let path = expand_home(text);
    if !path.is_file() {
        return Err(format!("{} is not a file", path.display()));
    }
    let accepted = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)));
    if !accepted || !is_video_file(&path) {
        return Err(format!("Supported formats: {}", extensions.join(", ")));
    }
    Ok(())
}

pub fn validate_output_dir(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Enter an output folder".to_string());
    }
    let path = expand_home(text);
    if path.exists() && !path.is_dir() {
        return Err(format!("{} is not a folder", path.display()));
    }
    Ok(())
}

/// [`FilePicker`] that asks for paths inside the converter TUI.
pub struct TuiPicker<'a> {
    tui: &'a mut ConverterTui,
    /// Background status shown while a prompt is open
    status: &'a mut dyn FnMut() -> Option<String>,
}

impl<'a> TuiPicker<'a> {
    pub fn new(tui: &'a mut ConverterTui, status: &'a mut dyn FnMut() -> Option<String>) -> Self {
        Self { tui, status }
    }
}

impl FilePicker for TuiPicker<'_> {
    fn pick_input_file(&mut self, initial_dir: Option<&Path>, extensions: &[&str]) -> Option<PathBuf> {
        let hint = format!("Video file ({})", extensions.join(", "));
        let validate = |text: &str| validate_input_path(text, extensions);
        match self.tui.prompt_line(
            "Select video",
            &hint,
            &initial_text(initial_dir),
            &validate,
            self.status,
        ) {
            Ok(answer) => answer.map(|text| expand_home(&text)),
            Err(e) => {
                tracing::error!("File prompt failed: {}", e);
                None
            }
        }
    }

    fn pick_output_dir(&mut self, initial_dir: Option<&Path>) -> Option<PathBuf> {
        match self.tui.prompt_line(
            "Select output folder",
            "Folder for the mp3 file, created if missing",
            &initial_text(initial_dir),
            &validate_output_dir,
            self.status,
        ) {
            Ok(answer) => answer.map(|text| expand_home(&text)),
            Err(e) => {
                tracing::error!("Folder prompt failed: {}", e);
                None
            }
        }
    }
}
