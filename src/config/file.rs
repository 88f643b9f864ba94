//! Configuration file management for clipmp3.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Encoding parameters applied to every export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// MP3 bitrate in kbps
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Encoder sample width in bytes (2 = 16-bit, 4 = 32-bit)
    #[serde(default = "default_sample_bytes")]
    pub sample_bytes: u8,
    /// Length of the fade-out at the end of every export, in seconds
    #[serde(default = "default_fade_out_secs")]
    pub fade_out_secs: f64,
    /// Seconds cut from the end of the video when choosing the default end time
    #[serde(default = "default_tail_trim_secs")]
    pub tail_trim_secs: f64,
    /// Prefix of the timestamped default file name
    #[serde(default = "default_file_name_prefix")]
    pub file_name_prefix: String,
}

fn default_bitrate_kbps() -> u32 {
    320
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_sample_bytes() -> u8 {
    4
}

fn default_fade_out_secs() -> f64 {
    0.5
}

fn default_tail_trim_secs() -> f64 {
    3.0
}

fn default_file_name_prefix() -> String {
    "clip_".to_string()
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            bitrate_kbps: default_bitrate_kbps(),
            sample_rate: default_sample_rate(),
            sample_bytes: default_sample_bytes(),
            fade_out_secs: default_fade_out_secs(),
            tail_trim_secs: default_tail_trim_secs(),
            file_name_prefix: default_file_name_prefix(),
        }
    }
}

impl ExportSettings {
    /// ffmpeg sample format for the configured sample width.
    ///
    /// libmp3lame accepts planar 16- and 32-bit integers; anything other than
    /// 4 bytes falls back to 16-bit.
    pub fn sample_format(&self) -> &'static str {
        match self.sample_bytes {
            4 => "s32p",
            _ => "s16p",
        }
    }
}

/// Preview player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Player binary, looked up in PATH unless absolute
    #[serde(default = "default_player")]
    pub player: String,
    /// Page opened when the player cannot decode the video
    #[serde(default = "default_codec_help_url")]
    pub codec_help_url: String,
}

fn default_player() -> String {
    "ffplay".to_string()
}

fn default_codec_help_url() -> String {
    "https://ffmpeg.org/download.html".to_string()
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            player: default_player(),
            codec_help_url: default_codec_help_url(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipConfig {
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub preview: PreviewConfig,
}

impl ClipConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        let config_content = fs::read_to_string(&config_path)?;
        let config: ClipConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Loads the configuration, writing the defaults first if no file exists yet.
    ///
    /// # Errors
    /// - If the default file cannot be written
    /// - If an existing file cannot be read or parsed
    pub fn load_or_create() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::info!("No config found, writing defaults to {}", config_path.display());
            ClipConfig::default().save()?;
        }
        Self::load()
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Retrieves the path to the config file, creating its directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find home directory",
            )
        })?
        .join(".config")
        .join("clipmp3");

    fs::create_dir_all(&config_dir)?;

    Ok(config_dir.join("clipmp3.toml"))
}
