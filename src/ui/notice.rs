//! Modal notices shown over the converter screen.

use crate::error::ConverterError;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Extra action a notice can offer besides dismissing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    /// Open the codec download page in the browser
    OpenCodecHelp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    pub action: Option<NoticeAction>,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            message: message.into(),
            action: None,
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            title: title.into(),
            message: message.into(),
            action: None,
        }
    }

    pub fn from_error(error: &ConverterError) -> Self {
        let kind = match error {
            ConverterError::FileRead(_) | ConverterError::Export(_) => NoticeKind::Error,
            _ => NoticeKind::Warning,
        };
        Self {
            kind,
            title: error.title().to_string(),
            message: error.to_string(),
            action: None,
        }
    }

    /// Non-fatal preview failure offering the codec download page.
    pub fn playback(detail: &str) -> Self {
        Self {
            kind: NoticeKind::Warning,
            title: "Preview warning".to_string(),
            message: format!(
                "Video preview is unavailable, probably because of a missing codec or an \
                 unsupported format.\nThis does not affect audio export, you can still convert.\n\n{detail}"
            ),
            action: Some(NoticeAction::OpenCodecHelp),
        }
    }

    pub fn saved(path: &Path) -> Self {
        Self::info(
            "Export complete",
            format!("Audio with a fade-out saved to {}", path.display()),
        )
    }
}
