//! Terminal user interface.
//!
//! - `converter`: the main converter screen and its key bindings
//! - `notice`: modal messages shown over the converter screen
//! - `picker`: path prompts implementing the session's file picker

pub mod converter;
pub mod notice;
pub mod picker;

pub use converter::{ConverterCommand, ConverterTui};
pub use notice::Notice;
pub use picker::TuiPicker;
