//! Error taxonomy for the converter session.
//!
//! Every variant is terminal for the current operation only. The interactive UI
//! turns them into notices and keeps running.

use thiserror::Error;

/// Errors produced by session operations and the media/playback/settings backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConverterError {
    /// The input file could not be opened or probed.
    #[error("Unable to read video file: {0}")]
    FileRead(String),

    /// Preview failed. Never blocks export.
    #[error("Preview unavailable: {0}")]
    Playback(String),

    /// Bad time range or missing selection, raised before any work starts.
    #[error("{0}")]
    Validation(String),

    /// An export is already running; the trigger is disabled.
    #[error("An export is already in progress")]
    ExportInFlight,

    /// ffmpeg, encoder or disk failure during export. Carries the raw message.
    #[error("{0}")]
    Export(String),

    /// The settings store could not persist a value.
    #[error("Failed to save settings: {0}")]
    Settings(String),
}

impl ConverterError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export(message.into())
    }

    /// Short title used for notices in the terminal UI.
    pub fn title(&self) -> &'static str {
        match self {
            Self::FileRead(_) => "Cannot read file",
            Self::Playback(_) => "Preview warning",
            Self::Validation(_) => "Invalid selection",
            Self::ExportInFlight => "Busy",
            Self::Export(_) => "Export failed",
            Self::Settings(_) => "Settings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_message_is_verbatim() {
        let err = ConverterError::export("Output file #0 does not contain any stream");
        assert_eq!(err.to_string(), "Output file #0 does not contain any stream");
    }

    #[test]
    fn test_titles() {
        assert_eq!(ConverterError::ExportInFlight.title(), "Busy");
        assert_eq!(ConverterError::validation("x").title(), "Invalid selection");
    }
}
