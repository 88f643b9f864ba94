//! Application command handlers for clipmp3.
//!
//! # Commands
//! - `convert`: Interactive converter (default command)
//! - `export`: Headless export of a time range to MP3
//! - `probe`: Print duration and size of a video file
//! - `config`: Open configuration file in user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod convert;
pub mod export;
pub mod logs;
pub mod probe;

pub use config::handle_config;
pub use convert::handle_convert;
pub use export::handle_export;
pub use logs::handle_logs;
pub use probe::handle_probe;
