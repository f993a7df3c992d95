//! Timestamp parsing with an ordered list of accepted formats.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Formats tried in order: fractional seconds first, then whole seconds.
pub const DEFAULT_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// A timestamp that matched none of the accepted formats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timestamp '{input}' matched none of the {tried} accepted formats")]
pub struct TimestampError {
    pub input: String,
    pub tried: usize,
}

/// Parses `date time` strings against each format in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampParser {
    formats: Vec<String>,
}

impl TimestampParser {
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Parse a separate date and time field, joined by a single space.
    pub fn parse(&self, date: &str, time: &str) -> Result<NaiveDateTime, TimestampError> {
        self.parse_str(&format!("{} {}", date.trim(), time.trim()))
    }

    /// Parse a complete `date time` string.
    pub fn parse_str(&self, input: &str) -> Result<NaiveDateTime, TimestampError> {
        self.formats
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
            .ok_or_else(|| TimestampError {
                input: input.to_string(),
                tried: self.formats.len(),
            })
    }
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self::new(
            DEFAULT_TIMESTAMP_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        )
    }
}
