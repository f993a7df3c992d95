//! Cyclical encoding of wall-clock time.
//!
//! Each periodic component of a timestamp becomes a `(sin, cos)` pair so that
//! 23:59 and 00:00 end up next to each other instead of at opposite ends of a
//! scale.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Seconds in one day, used both as a period and as the duration normalizer.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// A periodic component of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeComponent {
    Hour,
    Minute,
    Second,
    /// Day of month
    Day,
    Month,
    /// Monday = 0
    DayOfWeek,
    /// Seconds since midnight
    TimeOfDay,
}

impl TimeComponent {
    pub const ALL: [TimeComponent; 7] = [
        TimeComponent::Hour,
        TimeComponent::Minute,
        TimeComponent::Second,
        TimeComponent::Day,
        TimeComponent::Month,
        TimeComponent::DayOfWeek,
        TimeComponent::TimeOfDay,
    ];

    /// The period the component wraps around at.
    pub fn period(self) -> f64 {
        match self {
            TimeComponent::Hour => 24.0,
            TimeComponent::Minute => 60.0,
            TimeComponent::Second => 60.0,
            TimeComponent::Day => 31.0,
            TimeComponent::Month => 12.0,
            TimeComponent::DayOfWeek => 7.0,
            TimeComponent::TimeOfDay => SECONDS_PER_DAY,
        }
    }

    /// Feature name stem, e.g. `hour` in `start_hour_sin`.
    pub fn name(self) -> &'static str {
        match self {
            TimeComponent::Hour => "hour",
            TimeComponent::Minute => "minute",
            TimeComponent::Second => "second",
            TimeComponent::Day => "day",
            TimeComponent::Month => "month",
            TimeComponent::DayOfWeek => "day_of_week",
            TimeComponent::TimeOfDay => "time_of_day",
        }
    }

    /// Raw value of this component for a timestamp. Sub-second precision is ignored.
    pub fn value(self, ts: &NaiveDateTime) -> f64 {
        match self {
            TimeComponent::Hour => ts.hour() as f64,
            TimeComponent::Minute => ts.minute() as f64,
            TimeComponent::Second => ts.second() as f64,
            TimeComponent::Day => ts.day() as f64,
            TimeComponent::Month => ts.month() as f64,
            TimeComponent::DayOfWeek => ts.weekday().num_days_from_monday() as f64,
            TimeComponent::TimeOfDay => ts.num_seconds_from_midnight() as f64,
        }
    }
}

/// Which components make up a time block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeEncoding {
    /// All seven components (14 values)
    Full,
    /// Hour, minute, day, month, weekday (10 values)
    #[default]
    Compact,
}

const COMPACT_COMPONENTS: [TimeComponent; 5] = [
    TimeComponent::Hour,
    TimeComponent::Minute,
    TimeComponent::Day,
    TimeComponent::Month,
    TimeComponent::DayOfWeek,
];

impl TimeEncoding {
    pub fn components(self) -> &'static [TimeComponent] {
        match self {
            TimeEncoding::Full => &TimeComponent::ALL,
            TimeEncoding::Compact => &COMPACT_COMPONENTS,
        }
    }

    /// Number of values in one encoded block.
    pub fn width(self) -> usize {
        self.components().len() * 2
    }

    /// Feature names for one block, e.g. `start_hour_sin, start_hour_cos, ...`.
    pub fn feature_names(self, prefix: &str) -> Vec<String> {
        self.components()
            .iter()
            .flat_map(|c| {
                [
                    format!("{prefix}{}_sin", c.name()),
                    format!("{prefix}{}_cos", c.name()),
                ]
            })
            .collect()
    }
}

/// Encode a periodic value as `(sin(2πv/p), cos(2πv/p))`.
pub fn encode_cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = TAU * value / period;
    (angle.sin(), angle.cos())
}

/// Encode a timestamp into a block of `encoding.width()` values.
///
/// `None` yields an all-zero block of the same width so the vector shape never changes.
pub fn encode_timestamp(ts: Option<&NaiveDateTime>, encoding: TimeEncoding) -> Vec<f64> {
    let Some(ts) = ts else {
        return vec![0.0; encoding.width()];
    };

    encoding
        .components()
        .iter()
        .flat_map(|c| {
            let (sin, cos) = encode_cyclical(c.value(ts), c.period());
            [sin, cos]
        })
        .collect()
}

/// Recover the angular position in `[0, 2π)` from an encoded pair.
pub fn decode_angle(sin: f64, cos: f64) -> f64 {
    sin.atan2(cos).rem_euclid(TAU)
}
