//! Text rendering of table snapshots.

use crate::core::types::render_sample;
use crate::core::{ExpositionFormat, Reading};
use std::fmt::Write;

/// Render readings in the configured format.
pub fn render(readings: &[Reading], format: ExpositionFormat) -> String {
    match format {
        ExpositionFormat::Plain => render_plain(readings),
        ExpositionFormat::Timestamped => render_timestamped(readings),
    }
}

/// One `key value` line per reading, value in fixed-point with six decimals.
pub fn render_plain(readings: &[Reading]) -> String {
    let mut out = String::with_capacity(readings.len() * 64);
    for reading in readings {
        let _ = writeln!(out, "{} {}", reading.key, format_value(reading.value));
    }
    out
}

/// One `key value unix_millis` line per reading.
///
/// The reading time is parsed as RFC 3339; readings whose time does not parse
/// are rendered without a timestamp.
pub fn render_timestamped(readings: &[Reading]) -> String {
    let mut out = String::with_capacity(readings.len() * 80);
    for reading in readings {
        let value = format_value(reading.value);
        match chrono::DateTime::parse_from_rfc3339(&reading.time) {
            Ok(time) => {
                out.push_str(&render_sample(&reading.key, &value, time.timestamp_millis(), &[]));
                out.push('\n');
            }
            Err(_) => {
                let _ = writeln!(out, "{} {}", reading.key, value);
            }
        }
    }
    out
}

/// Fixed-point with six decimals; non-finite values as `+Inf`, `-Inf` and `NaN`.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        format!("{:.6}", value)
    }
}
