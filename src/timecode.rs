//! Timecode formatting and parsing.
//!
//! Display format is `mm:ss.zzz`. Minutes are not wrapped at the hour, so a
//! 75 minute video shows as `75:00.000`.

use crate::error::ConverterError;
use regex::Regex;
use std::sync::OnceLock;

/// Formats milliseconds as `mm:ss.zzz`.
pub fn format_millis(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{minutes:02}:{seconds:02}.{millis:03}")
}

/// Formats fractional seconds as `mm:ss.zzz`, rounding to the nearest millisecond.
pub fn format_secs(secs: f64) -> String {
    format_millis(secs_to_millis(secs))
}

/// Converts seconds to whole milliseconds. Negative and non-finite values become 0.
pub fn secs_to_millis(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}

/// The `mm:ss.zzz / mm:ss.zzz` label shown under the scrub bar.
pub fn position_label(position_ms: u64, duration_ms: u64) -> String {
    format!("{} / {}", format_millis(position_ms), format_millis(duration_ms))
}

fn timecode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:(\d+):)?(\d+):)?(\d+(?:\.\d{1,3})?)$").expect("timecode regex is valid")
    })
}

/// Parses `ss[.zzz]`, `mm:ss[.zzz]` or `hh:mm:ss[.zzz]` into seconds.
///
/// # Errors
/// - If the text does not match any accepted form
/// - If seconds (or minutes, with hours present) are 60 or more in a compound form
pub fn parse(text: &str) -> Result<f64, ConverterError> {
    let text = text.trim();
    let caps = timecode_regex()
        .captures(text)
        .ok_or_else(|| ConverterError::validation(format!("Invalid time '{text}', expected mm:ss.zzz")))?;

    let hours: u64 = caps.get(1).map_or(Ok(0), |m| m.as_str().parse()).map_err(|_| invalid(text))?;
    let minutes: u64 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).map_err(|_| invalid(text))?;
    let seconds: f64 = caps[3].parse().map_err(|_| invalid(text))?;

    if caps.get(2).is_some() && seconds >= 60.0 {
        return Err(ConverterError::validation(format!(
            "Invalid time '{text}': seconds must be below 60"
        )));
    }
    if caps.get(1).is_some() && minutes >= 60 {
        return Err(ConverterError::validation(format!(
            "Invalid time '{text}': minutes must be below 60"
        )));
    }

    let whole_secs = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .ok_or_else(|| ConverterError::validation(format!("Invalid time '{text}': value is too large")))?;

    Ok(whole_secs as f64 + seconds)
}

fn invalid(text: &str) -> ConverterError {
    ConverterError::validation(format!("Invalid time '{text}'"))
}
