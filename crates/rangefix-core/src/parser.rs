//! # Record Parser
//!
//! Turns one console line from a radio endpoint into a typed measurement.
//!
//! The firmware output has no fixed layout, so fields are found by scanning
//! for markers anywhere in the line:
//!
//! ```text
//! Peer 24:6F:28:AA:01:02 RSSI: -55 dBm Distance: 3.20m (tx #118)
//!                        ^^^^^     ^^^ ^^^^^^^^^     ^
//! ```
//!
//! Extra text before, between and after the markers is accepted.

use crate::error::{MeasurementField, ParseError};

pub const STRENGTH_MARKER: &str = "RSSI:";
pub const STRENGTH_UNIT: &str = "dBm";
pub const DISTANCE_MARKER: &str = "Distance:";
pub const DISTANCE_UNIT: &str = "m";

/// Lines carrying one of these are link status reports from the firmware.
pub const STATUS_MARKERS: &[&str] = &["Position report status:", "Send Status:"];

/// Numeric content of a measurement line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedMeasurement {
    /// Signal strength in dBm as reported by the device.
    pub raw_strength: i32,
    /// Device-reported distance in metres, when the line carries one.
    pub raw_distance: Option<f64>,
}

/// Classification of a line that parsed cleanly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedLine {
    Measurement(ParsedMeasurement),
    /// Not a measurement, but a status report worth surfacing.
    Status,
    /// Anything else the endpoint prints.
    NotAMeasurement,
}

/// Parse one line.
///
/// Returns `Err(MalformedMeasurement)` only when the measurement markers are
/// present but a number between them does not parse.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let Some(strength_text) = between(line, STRENGTH_MARKER, STRENGTH_UNIT) else {
        if is_status(line) {
            return Ok(ParsedLine::Status);
        }
        return Ok(ParsedLine::NotAMeasurement);
    };

    let raw_strength = strength_text
        .trim()
        .parse::<i32>()
        .map_err(|_| ParseError::malformed(MeasurementField::Strength, strength_text))?;

    let raw_distance = if line.contains(DISTANCE_MARKER) {
        // Marker without a trailing unit cannot be delimited.
        let text = between(line, DISTANCE_MARKER, DISTANCE_UNIT)
            .ok_or_else(|| ParseError::malformed(MeasurementField::Distance, line))?;
        Some(parse_distance(text)?)
    } else {
        None
    };

    Ok(ParsedLine::Measurement(ParsedMeasurement {
        raw_strength,
        raw_distance,
    }))
}

/// Whether the line is a firmware status report.
pub fn is_status(line: &str) -> bool {
    STATUS_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Text between the first `start` marker and the first `end` marker after it.
fn between<'a>(line: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = line.find(start)? + start.len();
    let len = line[from..].find(end)?;
    Some(&line[from..from + len])
}

fn parse_distance(text: &str) -> Result<f64, ParseError> {
    match text.trim().parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(ParseError::malformed(MeasurementField::Distance, text)),
    }
}
