//! Persisted user settings: the last-used input and output directories.
//!
//! Values are written through on every change. A missing or unreadable file
//! reads as empty so a corrupt settings file never blocks the converter.

use crate::error::ConverterError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Storage for directories remembered across runs.
pub trait SettingsStore {
    /// Directory the input picker starts in.
    fn last_input_dir(&self) -> Option<PathBuf>;
    /// Output directory chosen in a previous session.
    fn last_output_dir(&self) -> Option<PathBuf>;
    /// Remembers the directory of the most recently opened video.
    fn set_last_input_dir(&mut self, dir: &Path) -> Result<(), ConverterError>;
    /// Remembers the most recently chosen output directory.
    fn set_last_output_dir(&mut self, dir: &Path) -> Result<(), ConverterError>;
}

/// On-disk shape of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_input_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_output_dir: Option<PathBuf>,
}

/// TOML-backed settings store in the user's data directory.
pub struct TomlSettingsStore {
    path: PathBuf,
    values: StoredSettings,
}

impl TomlSettingsStore {
    /// Opens the store at `path`, reading existing values if present.
    pub fn open(path: PathBuf) -> Self {
        let values = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                StoredSettings::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings file {}: {}", path.display(), e);
                StoredSettings::default()
            }
        };

        Self { path, values }
    }

    /// Opens the store at `~/.local/share/clipmp3/settings.toml`.
    ///
    /// # Errors
    /// - If the home directory cannot be determined
    pub fn open_default() -> anyhow::Result<Self> {
        let data_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".local")
            .join("share")
            .join("clipmp3");

        Ok(Self::open(data_dir.join("settings.toml")))
    }

    fn persist(&self) -> Result<(), ConverterError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConverterError::Settings(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(&self.values).map_err(|e| ConverterError::Settings(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| ConverterError::Settings(e.to_string()))?;
        tracing::debug!("Settings saved to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for TomlSettingsStore {
    fn last_input_dir(&self) -> Option<PathBuf> {
        self.values.last_input_dir.clone()
    }

    fn last_output_dir(&self) -> Option<PathBuf> {
        self.values.last_output_dir.clone()
    }

    fn set_last_input_dir(&mut self, dir: &Path) -> Result<(), ConverterError> {
        self.values.last_input_dir = Some(dir.to_path_buf());
        self.persist()
    }

    fn set_last_output_dir(&mut self, dir: &Path) -> Result<(), ConverterError> {
        self.values.last_output_dir = Some(dir.to_path_buf());
        self.persist()
    }
}
