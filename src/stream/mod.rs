//! Event stream ingestion.
//!
//! This module turns raw log records into validated [`Event`]s. Bad records
//! are skipped one at a time; a single unparsable timestamp or malformed
//! activity marker never aborts the run.

pub mod timestamp;
pub mod types;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

// Re-export commonly used types
pub use timestamp::{TimestampError, TimestampParser, DEFAULT_TIMESTAMP_FORMATS};
pub use types::{ActivityMarker, Event, EventRecord, MarkerAction, MarkerError, SensorState};

/// Counts of what happened while ingesting records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records seen
    pub records_read: u64,
    /// Records dropped because no timestamp format matched
    pub timestamp_failures: u64,
    /// Records kept but with their activity marker discarded
    pub malformed_markers: u64,
}

/// Validated events plus the ingestion report.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub events: Vec<Event>,
    pub report: IngestReport,
}

/// Errors loading a record file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse event records in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load a JSON array of [`EventRecord`]s from disk.
pub fn load_records(path: &Path) -> Result<Vec<EventRecord>, IngestError> {
    let content = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| IngestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Convert one record into an event.
///
/// A bad timestamp drops the record; a bad marker only drops the marker.
pub fn parse_record(
    record: &EventRecord,
    parser: &TimestampParser,
) -> Result<(Event, Option<MarkerError>), TimestampError> {
    let timestamp = parser.parse(&record.date, &record.time)?;
    let mut event = Event::new(
        timestamp,
        record.sensor.trim(),
        SensorState::parse(&record.state),
    );

    let mut marker_error = None;
    if let Some(text) = record.activity_text() {
        match ActivityMarker::parse(text) {
            Ok(marker) => event.activity_marker = Some(marker),
            Err(e) => marker_error = Some(e),
        }
    }

    Ok((event, marker_error))
}

/// Convert records into events in stream order, skipping what cannot be parsed.
pub fn ingest_records(records: &[EventRecord], parser: &TimestampParser) -> Ingested {
    let mut ingested = Ingested::default();

    for (position, record) in records.iter().enumerate() {
        ingested.report.records_read += 1;

        match parse_record(record, parser) {
            Ok((event, marker_error)) => {
                if let Some(e) = marker_error {
                    debug!(position, error = %e, "discarding malformed activity marker");
                    ingested.report.malformed_markers += 1;
                }
                ingested.events.push(event);
            }
            Err(e) => {
                warn!(position, error = %e, "skipping record with unparsable timestamp");
                ingested.report.timestamp_failures += 1;
            }
        }
    }

    ingested
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_skips_bad_timestamps() {
        let records = vec![
            EventRecord::new("2010-11-04", "05:40:51.303739", "M004", "ON"),
            EventRecord::new("2010-11-04", "garbage", "M005", "ON"),
            EventRecord::new("2010-11-04", "05:40:57", "M004", "OFF"),
        ];

        let ingested = ingest_records(&records, &TimestampParser::default());
        assert_eq!(ingested.events.len(), 2);
        assert_eq!(ingested.report.records_read, 3);
        assert_eq!(ingested.report.timestamp_failures, 1);
        assert_eq!(ingested.events[1].state, SensorState::Off);
    }

    #[test]
    fn test_ingest_keeps_event_with_malformed_marker() {
        let records = vec![
            EventRecord::new("2010-11-04", "05:40:51", "M004", "ON").with_activity("Sleeping"),
            EventRecord::new("2010-11-04", "05:40:52", "M004", "OFF")
                .with_activity("Sleeping, end"),
        ];

        let ingested = ingest_records(&records, &TimestampParser::default());
        assert_eq!(ingested.events.len(), 2);
        assert_eq!(ingested.report.malformed_markers, 1);
        assert!(ingested.events[0].activity_marker.is_none());
        assert_eq!(
            ingested.events[1].activity_marker,
            Some(ActivityMarker::end("Sleeping"))
        );
    }

    #[test]
    fn test_records_deserialize_from_log_export() {
        let json = r#"[
            {"date": "2010-11-04", "time": "00:03:50.209589", "sensor": "M004", "state": "ON", "activity": "Bed_to_Toilet,begin"},
            {"date": "2010-11-04", "time": "00:03:57.399391", "sensor": "M005", "state": "ON", "activity": ""},
            {"date": "2010-11-04", "time": "00:04:01", "sensor": "D001", "state": "OPEN"}
        ]"#;

        let records: Vec<EventRecord> = serde_json::from_str(json).unwrap();
        let ingested = ingest_records(&records, &TimestampParser::default());
        assert_eq!(ingested.events.len(), 3);
        assert!(ingested.events[0].activity_marker.is_some());
        assert!(ingested.events[1].activity_marker.is_none());
        assert_eq!(ingested.events[2].state, SensorState::Open);
    }
}
