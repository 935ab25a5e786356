//! Core types for the vehicle tracker library
//!
//! This module defines the telemetry the tracker consumes and the error type
//! every fallible operation returns. Samples are produced by the telemetry
//! backend and consumed read-only; the tracker never mutates or stores them
//! beyond the batch currently being replayed.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// An ordered batch of samples returned by one fetch
pub type TelemetryBatch = Vec<TelemetrySample>;

/// Errors that can occur while fetching or decoding telemetry
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Telemetry endpoint responded with HTTP {0}")]
    Status(u16),

    #[error("Failed to parse telemetry: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Telemetry stream error: {0}")]
    Stream(String),

    #[error("Unknown refresh policy: {0} (expected skip, restart or overlap)")]
    InvalidPolicy(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// One reported vehicle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub latitude: f64,
    pub longitude: f64,
    /// Vehicle speed as reported by the backend
    pub speed: f64,
    /// Estimated time of arrival as reported by the backend
    pub eta: f64,
    /// Displayed verbatim; the event stream omits it entirely
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: SampleTime,
}

impl TelemetrySample {
    /// Position of this sample on the map
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// A `null` timestamp reads the same as a missing one
fn null_as_default<'de, D>(deserializer: D) -> std::result::Result<SampleTime, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SampleTime>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sample timestamp as sent by the backend, either a string or a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleTime {
    Text(String),
    Number(serde_json::Number),
}

impl Default for SampleTime {
    fn default() -> Self {
        SampleTime::Text(String::new())
    }
}

impl fmt::Display for SampleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleTime::Text(text) => f.write_str(text),
            // Whole floats print without a fraction: 1224730384.0 as 1224730384
            SampleTime::Number(number) => match number.as_f64() {
                Some(value) if number.is_f64() && value.fract() == 0.0 && value.abs() < 1e21 => {
                    write!(f, "{:.0}", value)
                }
                _ => write!(f, "{}", number),
            },
        }
    }
}

/// Decode a response body into a telemetry batch
///
/// The body must be a JSON array of sample objects. A single malformed
/// sample rejects the whole batch so nothing half-valid reaches the display.
pub fn parse_batch(body: &[u8]) -> Result<TelemetryBatch> {
    let batch: TelemetryBatch = serde_json::from_slice(body)?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_with_string_and_numeric_timestamps() {
        let body = br#"[
            {"latitude": 39.977183, "longitude": 116.329867, "speed": 42.5, "eta": 12.0, "timestamp": "2008-10-23 02:53:04"},
            {"latitude": 39.9771, "longitude": 116.3298, "speed": 30.0, "eta": 11.5, "timestamp": 1224730384}
        ]"#;

        let batch = parse_batch(body).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].timestamp.to_string(), "2008-10-23 02:53:04");
        assert_eq!(batch[1].timestamp.to_string(), "1224730384");
        assert_eq!(batch[0].position(), LatLng::new(39.977183, 116.329867));
    }

    #[test]
    fn test_float_and_null_timestamps() {
        let body = br#"[
            {"latitude": 1.0, "longitude": 2.0, "speed": 3.0, "eta": 4.0, "timestamp": 1224730384.0},
            {"latitude": 1.0, "longitude": 2.0, "speed": 3.0, "eta": 4.0, "timestamp": 1224730384.25},
            {"latitude": 1.0, "longitude": 2.0, "speed": 3.0, "eta": 4.0, "timestamp": null}
        ]"#;

        let batch = parse_batch(body).unwrap();
        assert_eq!(batch[0].timestamp.to_string(), "1224730384");
        assert_eq!(batch[1].timestamp.to_string(), "1224730384.25");
        assert_eq!(batch[2].timestamp, SampleTime::default());
        assert_eq!(batch[2].timestamp.to_string(), "");
    }

    #[test]
    fn test_parse_empty_batch() {
        assert!(parse_batch(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_missing_timestamp_defaults_to_empty() {
        let body = br#"[{"latitude": 1.0, "longitude": 2.0, "speed": 3.0, "eta": 4.0}]"#;
        let batch = parse_batch(body).unwrap();
        assert_eq!(batch[0].timestamp.to_string(), "");
    }

    #[test]
    fn test_malformed_bodies_are_rejected() {
        // Not JSON
        assert!(matches!(parse_batch(b"<html>"), Err(TrackerError::Parse(_))));
        // Not an array
        assert!(parse_batch(br#"{"latitude": 1.0}"#).is_err());
        // Sample with a non-numeric coordinate
        let body = br#"[{"latitude": "north", "longitude": 2.0, "speed": 3.0, "eta": 4.0}]"#;
        assert!(parse_batch(body).is_err());
    }
}
