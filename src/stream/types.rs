//! Event types for the sensor log.
//!
//! A log record is turned into an [`Event`] once its timestamp has been parsed
//! and its optional activity marker validated. Events are immutable after that.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A raw record as it appears in an exported sensor log.
///
/// Field names follow the log export (`date`, `time`, `sensor`, `state`,
/// `activity`); nothing here is validated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: String,
    pub time: String,
    pub sensor: String,
    pub state: String,
    /// Activity annotation such as `"Sleeping,begin"`; empty or absent when unannotated
    #[serde(default)]
    pub activity: Option<String>,
}

impl EventRecord {
    pub fn new(date: &str, time: &str, sensor: &str, state: &str) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
            sensor: sensor.to_string(),
            state: state.to_string(),
            activity: None,
        }
    }

    /// Attach an activity annotation.
    pub fn with_activity(mut self, activity: &str) -> Self {
        self.activity = Some(activity.to_string());
        self
    }

    /// The activity annotation, if it carries any text.
    pub fn activity_text(&self) -> Option<&str> {
        self.activity
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Reported state of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorState {
    On,
    Off,
    Open,
    Close,
    /// Analog reading (temperature, light level, ...)
    Numeric(f64),
    /// Anything else, kept verbatim
    Other(String),
}

impl SensorState {
    /// Parse a raw state string. Never fails: unknown values become `Other`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "ON" => SensorState::On,
            "OFF" => SensorState::Off,
            "OPEN" => SensorState::Open,
            "CLOSE" | "CLOSED" => SensorState::Close,
            _ => match trimmed.parse::<f64>() {
                Ok(value) => SensorState::Numeric(value),
                Err(_) => SensorState::Other(trimmed.to_string()),
            },
        }
    }

    /// Canonical upper-case label used when matching against configured active states.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            SensorState::On => Cow::Borrowed("ON"),
            SensorState::Off => Cow::Borrowed("OFF"),
            SensorState::Open => Cow::Borrowed("OPEN"),
            SensorState::Close => Cow::Borrowed("CLOSE"),
            SensorState::Numeric(value) => Cow::Owned(value.to_string()),
            SensorState::Other(raw) => Cow::Owned(raw.to_ascii_uppercase()),
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Whether a marker opens or closes an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerAction {
    Begin,
    End,
}

/// An activity annotation attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMarker {
    pub activity_name: String,
    pub action: MarkerAction,
}

/// Why an activity annotation could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    #[error("activity marker '{0}' is not a '<name>,<begin|end>' pair")]
    NotAPair(String),
    #[error("activity marker '{0}' has an empty activity name")]
    EmptyName(String),
    #[error("activity marker action '{0}' is neither begin nor end")]
    UnknownAction(String),
}

impl ActivityMarker {
    pub fn begin(activity_name: &str) -> Self {
        Self {
            activity_name: activity_name.to_string(),
            action: MarkerAction::Begin,
        }
    }

    pub fn end(activity_name: &str) -> Self {
        Self {
            activity_name: activity_name.to_string(),
            action: MarkerAction::End,
        }
    }

    /// Parse `"<name>,<begin|end>"`, stripping whitespace around both parts.
    pub fn parse(raw: &str) -> Result<Self, MarkerError> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        let [name, action] = parts.as_slice() else {
            return Err(MarkerError::NotAPair(raw.to_string()));
        };

        if name.is_empty() {
            return Err(MarkerError::EmptyName(raw.to_string()));
        }

        let action = if action.eq_ignore_ascii_case("begin") {
            MarkerAction::Begin
        } else if action.eq_ignore_ascii_case("end") {
            MarkerAction::End
        } else {
            return Err(MarkerError::UnknownAction(action.to_string()));
        };

        Ok(Self {
            activity_name: name.to_string(),
            action,
        })
    }
}

impl FromStr for ActivityMarker {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ActivityMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            MarkerAction::Begin => "begin",
            MarkerAction::End => "end",
        };
        write!(f, "{},{}", self.activity_name, action)
    }
}

/// One validated sensor log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: NaiveDateTime,
    pub sensor_id: String,
    pub state: SensorState,
    pub activity_marker: Option<ActivityMarker>,
}

impl Event {
    pub fn new(timestamp: NaiveDateTime, sensor_id: &str, state: SensorState) -> Self {
        Self {
            timestamp,
            sensor_id: sensor_id.to_string(),
            state,
            activity_marker: None,
        }
    }

    /// Attach an activity marker.
    pub fn with_marker(mut self, marker: ActivityMarker) -> Self {
        self.activity_marker = Some(marker);
        self
    }
}
