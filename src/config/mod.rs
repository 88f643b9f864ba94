//! Configuration management for clipmp3.
//!
//! This module handles the TOML configuration file (export and preview options)
//! and the small settings store that remembers the last-used directories
//! between runs. Configuration lives in the user's config directory, remembered
//! directories in the user's local data directory.

pub mod file;
pub mod settings;

pub use file::{get_config_path, ClipConfig, ExportSettings};
pub use settings::{SettingsStore, TomlSettingsStore};
