//! Feature vector assembly.
//!
//! Every window becomes one fixed-length vector laid out as:
//!
//! 1. start-time cyclical block
//! 2. end-time cyclical block
//! 3. `activity_duration_normalized`
//! 4. one activation count per catalog sensor
//!
//! The layout depends only on configuration, so every vector in a dataset has
//! the same shape and the same column names.

use crate::core::intervals::ActivityDuration;
use crate::core::sensors::SensorCatalog;
use crate::core::time_encoding::{encode_timestamp, TimeEncoding, SECONDS_PER_DAY};
use crate::core::windowing::{seconds_between, Window};
use crate::stream::Event;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Column name of the duration scalar.
pub const DURATION_FEATURE_NAME: &str = "activity_duration_normalized";

/// Floor applied to the normalized duration so zero-length windows stay distinguishable.
pub const MIN_NORMALIZED_DURATION: f64 = 1e-4;

const START_PREFIX: &str = "start_";
const END_PREFIX: &str = "end_";

/// Where the time blocks and duration scalar are measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAnchor {
    /// First and last event of the window
    #[default]
    WindowBounds,
    /// Start of the window's majority activity and its accrued duration
    MajorityInterval,
}

/// Declared order and names of the vector's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub time_encoding: TimeEncoding,
    pub sensors: Vec<String>,
}

impl FeatureLayout {
    pub fn new(time_encoding: TimeEncoding, catalog: &SensorCatalog) -> Self {
        Self {
            time_encoding,
            sensors: catalog.sensors.clone(),
        }
    }

    /// Width of one cyclical time block.
    pub fn time_block_width(&self) -> usize {
        self.time_encoding.width()
    }

    /// Number of values in the time section (both blocks plus the duration scalar).
    pub fn time_feature_count(&self) -> usize {
        self.time_block_width() * 2 + 1
    }

    pub fn duration_offset(&self) -> usize {
        self.time_block_width() * 2
    }

    pub fn sensor_offset(&self) -> usize {
        self.duration_offset() + 1
    }

    /// Number of values in every vector.
    pub fn vector_len(&self) -> usize {
        self.sensor_offset() + self.sensors.len()
    }

    /// All column names in vector order.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.time_encoding.feature_names(START_PREFIX);
        names.extend(self.time_encoding.feature_names(END_PREFIX));
        names.push(DURATION_FEATURE_NAME.to_string());
        names.extend(self.sensors.iter().cloned());
        names
    }
}

/// The time range a vector's time section describes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub duration_seconds: f64,
}

impl TimeSpan {
    pub fn from_window(window: &Window) -> Self {
        Self {
            start: Some(window.start_timestamp),
            end: Some(window.end_timestamp),
            duration_seconds: window.duration_seconds(),
        }
    }

    /// Span of the majority activity, from its first start to the last time it was credited.
    ///
    /// With no majority activity both timestamps are absent and encode as zero blocks.
    pub fn from_majority(majority: Option<&ActivityDuration>) -> Self {
        match majority {
            Some(m) => Self {
                start: Some(m.first_start),
                end: Some(m.credited_until),
                duration_seconds: seconds_between(m.first_start, m.credited_until),
            },
            None => Self {
                start: None,
                end: None,
                duration_seconds: 0.0,
            },
        }
    }
}

/// One assembled vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// The duration scalar, given the layout the vector was built with.
    pub fn duration(&self, layout: &FeatureLayout) -> Option<f64> {
        self.values.get(layout.duration_offset()).copied()
    }

    /// The sensor count section.
    pub fn sensor_counts(&self, layout: &FeatureLayout) -> &[f64] {
        self.values.get(layout.sensor_offset()..).unwrap_or(&[])
    }
}

/// `max(seconds / 86400, 1e-4)`.
pub fn normalize_duration(seconds: f64) -> f64 {
    (seconds / SECONDS_PER_DAY).max(MIN_NORMALIZED_DURATION)
}

/// Build the vector for one window.
pub fn assemble(
    layout: &FeatureLayout,
    catalog: &SensorCatalog,
    span: &TimeSpan,
    window_events: &[Event],
) -> FeatureVector {
    let mut values = Vec::with_capacity(layout.vector_len());
    values.extend(encode_timestamp(span.start.as_ref(), layout.time_encoding));
    values.extend(encode_timestamp(span.end.as_ref(), layout.time_encoding));
    values.push(normalize_duration(span.duration_seconds));
    values.extend(
        catalog
            .count_activations(window_events)
            .into_iter()
            .map(f64::from),
    );
    FeatureVector { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SensorState;
    use chrono::{Duration, NaiveDate};

    fn at(seconds: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 11, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + Duration::seconds(seconds)
    }

    fn small_catalog() -> SensorCatalog {
        SensorCatalog::new(vec!["M001".into(), "M002".into(), "D001".into()])
    }

    #[test]
    fn test_layout_names_and_offsets() {
        let layout = FeatureLayout::new(TimeEncoding::Compact, &small_catalog());
        let names = layout.names();

        assert_eq!(layout.vector_len(), 10 + 10 + 1 + 3);
        assert_eq!(names.len(), layout.vector_len());
        assert_eq!(names[0], "start_hour_sin");
        assert_eq!(names[10], "end_hour_sin");
        assert_eq!(names[layout.duration_offset()], DURATION_FEATURE_NAME);
        assert_eq!(names[layout.sensor_offset()], "M001");
        assert_eq!(names.last().unwrap(), "D001");
    }

    #[test]
    fn test_full_layout_with_default_catalog() {
        let layout = FeatureLayout::new(TimeEncoding::Full, &SensorCatalog::default());
        assert_eq!(layout.time_feature_count(), 29);
        assert_eq!(layout.vector_len(), 29 + 34);
    }

    #[test]
    fn test_normalize_duration_floor() {
        assert_eq!(normalize_duration(0.0), MIN_NORMALIZED_DURATION);
        assert_eq!(normalize_duration(43_200.0), 0.5);
        assert!((normalize_duration(10.0) - 10.0 / 86_400.0).abs() < 1e-15);
    }

    #[test]
    fn test_assemble_window_bounds() {
        let catalog = small_catalog();
        let layout = FeatureLayout::new(TimeEncoding::Compact, &catalog);
        let events = vec![
            Event::new(at(0), "M001", SensorState::On),
            Event::new(at(5), "M002", SensorState::Off),
            Event::new(at(10), "M001", SensorState::On),
        ];
        let window = Window::over(&events, 0, 2);

        let v = assemble(&layout, &catalog, &TimeSpan::from_window(&window), &events);
        assert_eq!(v.len(), layout.vector_len());
        assert!((v.duration(&layout).unwrap() - 10.0 / 86_400.0).abs() < 1e-15);
        assert_eq!(v.sensor_counts(&layout), &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_majority_span_without_winner_is_zero_blocks() {
        let catalog = small_catalog();
        let layout = FeatureLayout::new(TimeEncoding::Full, &catalog);
        let events = vec![Event::new(at(0), "M001", SensorState::On)];

        let v = assemble(&layout, &catalog, &TimeSpan::from_majority(None), &events);
        assert!(v.values[..layout.duration_offset()].iter().all(|x| *x == 0.0));
        assert_eq!(v.duration(&layout), Some(MIN_NORMALIZED_DURATION));
    }

    #[test]
    fn test_majority_span_runs_to_last_credit() {
        // Carried interval: begun at 0, this window credits only 40..90.5.
        let majority = ActivityDuration {
            activity_name: "Relax".into(),
            seconds: 50.5,
            first_start: at(0),
            credited_until: at(90) + Duration::milliseconds(500),
        };
        let span = TimeSpan::from_majority(Some(&majority));
        assert_eq!(span.start, Some(at(0)));
        assert_eq!(span.end, Some(at(90) + Duration::milliseconds(500)));
        assert_eq!(span.duration_seconds, 90.5);
    }
}
