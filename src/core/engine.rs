//! The segmentation engine.
//!
//! A sequential fold over the event stream:
//!
//! ```text
//! cursor ──► boundary resolver ──► window
//!                                    │
//!            open intervals ──► interval tracker ──► durations ──► label resolver
//!                 ▲                  │                                 │
//!                 └── still open ◄───┘                                 ▼
//!                                   encoder + counter ──► feature vector + label
//! ```
//!
//! The open-interval set is the only state that flows from one window to the
//! next. It lives on the engine and is replaced, never mutated, after every
//! window. In labeled mode, events that fall between windows (skipped stale
//! events, the annotated runs around gap windows) are folded into it too,
//! without producing a record.

use crate::config::{Config, ConfigError};
use crate::core::features::{assemble, FeatureLayout, FeatureVector, TimeAnchor, TimeSpan};
use crate::core::intervals::{ActivityDurations, IntervalIssue, IntervalTracker, OpenIntervals};
use crate::core::labels::{LabelSource, MajorityLabelResolver, ResolvedLabel};
use crate::core::sensors::SensorCatalog;
use crate::core::stats::SegmentationStats;
use crate::core::windowing::{Boundary, BoundaryResolver, Window, WindowBoundary};
use crate::stream::{ingest_records, Event, EventRecord, TimestampParser};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Run-level failures. Everything else is skipped, counted and logged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event stream is empty")]
    EmptyStream,
    #[error("none of the {records} input records could be parsed")]
    CorruptStream { records: u64 },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// One window's vector and, in labeled mode, its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledWindow {
    pub window: Window,
    pub features: FeatureVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<ResolvedLabel>,
}

/// Everything one run produced.
#[derive(Debug, Clone, Default)]
pub struct SegmentationOutput {
    pub records: Vec<LabeledWindow>,
    pub stats: SegmentationStats,
}

/// Turns an event stream into labeled feature vectors.
pub struct SegmentationEngine {
    resolver: BoundaryResolver,
    tracker: IntervalTracker,
    labels: MajorityLabelResolver,
    open: OpenIntervals,
    catalog: SensorCatalog,
    layout: FeatureLayout,
    parser: TimestampParser,
    time_anchor: TimeAnchor,
    labeled: bool,
}

impl SegmentationEngine {
    /// Validate `config` and build an engine from it.
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            resolver: config.build_resolver(),
            tracker: IntervalTracker::new(config.unmatched_end_policy()),
            labels: MajorityLabelResolver::new(),
            open: OpenIntervals::new(),
            catalog: config.sensors.clone(),
            layout: FeatureLayout::new(config.time_encoding, &config.sensors),
            parser: config.timestamp_parser(),
            time_anchor: config.time_anchor,
            labeled: config.labeled,
        })
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn policy_name(&self) -> &'static str {
        self.resolver.name()
    }

    pub fn is_labeled(&self) -> bool {
        self.labeled
    }

    /// Intervals still open after the last processed window.
    pub fn open_intervals(&self) -> &OpenIntervals {
        &self.open
    }

    /// Forget all carried state.
    pub fn reset(&mut self) {
        self.open = OpenIntervals::new();
        self.labels.reset();
        self.resolver.reset();
    }

    /// Segment an already parsed stream.
    pub fn segment(&mut self, events: &[Event]) -> Result<SegmentationOutput, EngineError> {
        if events.is_empty() {
            return Err(EngineError::EmptyStream);
        }
        let mut stats = SegmentationStats::new();
        stats.record_events(events.len());
        Ok(self.run(events, stats))
    }

    /// Parse raw records and segment the resulting stream.
    pub fn segment_records(
        &mut self,
        records: &[EventRecord],
    ) -> Result<SegmentationOutput, EngineError> {
        if records.is_empty() {
            return Err(EngineError::EmptyStream);
        }

        let ingested = ingest_records(records, &self.parser);
        if ingested.events.is_empty() {
            return Err(EngineError::CorruptStream {
                records: ingested.report.records_read,
            });
        }
        info!(
            records = ingested.report.records_read,
            events = ingested.events.len(),
            timestamp_failures = ingested.report.timestamp_failures,
            "ingested event records"
        );

        let mut stats = SegmentationStats::new();
        stats.record_ingest(&ingested.report);
        Ok(self.run(&ingested.events, stats))
    }

    fn run(&mut self, events: &[Event], mut stats: SegmentationStats) -> SegmentationOutput {
        self.reset();
        let mut records = Vec::new();
        let mut cursor = 0;
        // First event not yet seen by the interval tracker.
        let mut tracked = 0;

        loop {
            match self.resolver.next_boundary(events, cursor) {
                Boundary::Window(window) => {
                    cursor = window.end_index + 1;
                    debug!(
                        start = window.start_index,
                        end = window.end_index,
                        duration_secs = window.duration_seconds(),
                        "window"
                    );
                    stats.record_window(window.duration_seconds());
                    if self.labeled && window.start_index > tracked {
                        self.catch_up(events, tracked, window.start_index, &mut stats);
                    }
                    tracked = window.end_index + 1;
                    let record = self.process_window(window, events, &mut stats);
                    records.push(record);
                }
                Boundary::Skip {
                    next_cursor,
                    reason,
                    events: skipped,
                } => {
                    debug!(cursor, next_cursor, ?reason, skipped, "no window");
                    stats.record_skip(reason, skipped);
                    cursor = next_cursor.max(cursor + 1);
                }
                Boundary::Exhausted => break,
            }
        }

        info!(
            policy = self.resolver.name(),
            windows = records.len(),
            still_open = self.open.len(),
            "segmentation finished"
        );
        SegmentationOutput { records, stats }
    }

    fn process_window(
        &mut self,
        window: Window,
        events: &[Event],
        stats: &mut SegmentationStats,
    ) -> LabeledWindow {
        let slice = window.slice(events);

        if !self.labeled {
            let features = assemble(
                &self.layout,
                &self.catalog,
                &TimeSpan::from_window(&window),
                slice,
            );
            return LabeledWindow {
                window,
                features,
                label: None,
            };
        }

        let durations = self.advance(slice, window.start_index, stats);
        let label = self.labels.resolve(&durations);
        stats.record_label(&label);

        let span = match self.time_anchor {
            TimeAnchor::WindowBounds => TimeSpan::from_window(&window),
            TimeAnchor::MajorityInterval => {
                let majority = match label.source {
                    LabelSource::Majority => durations.get(&label.label),
                    LabelSource::CarriedForward | LabelSource::Unknown => None,
                };
                TimeSpan::from_majority(majority)
            }
        };
        let features = assemble(&self.layout, &self.catalog, &span, slice);

        LabeledWindow {
            window,
            features,
            label: Some(label),
        }
    }

    /// Run the tracker over `events[from..to]`, which belong to no window.
    ///
    /// Open intervals and the last real label carry on; nothing is emitted.
    fn catch_up(
        &mut self,
        events: &[Event],
        from: usize,
        to: usize,
        stats: &mut SegmentationStats,
    ) {
        debug!(from, to, "tracking events outside windows");
        let durations = self.advance(&events[from..to], from, stats);
        self.labels.resolve(&durations);
    }

    /// One tracker step; replaces the open set and returns the accrued durations.
    fn advance(
        &mut self,
        slice: &[Event],
        start_index: usize,
        stats: &mut SegmentationStats,
    ) -> ActivityDurations {
        let step = self.tracker.advance(slice, start_index, &self.open);
        for issue in &step.issues {
            log_issue(issue);
            stats.record_issue(issue);
        }
        self.open = step.still_open;
        step.closed_durations
    }
}

fn log_issue(issue: &IntervalIssue) {
    match issue {
        IntervalIssue::NegativeInterval {
            activity_name,
            start_index,
            index,
            seconds,
        } => warn!(
            activity = %activity_name,
            start_index,
            index,
            seconds,
            "activity ends before its credited start"
        ),
        IntervalIssue::UnmatchedEndDropped {
            activity_name,
            index,
        } => debug!(activity = %activity_name, index, "dropping unmatched end marker"),
        IntervalIssue::UnmatchedEndBackfilled {
            activity_name,
            index,
            seconds,
        } => debug!(
            activity = %activity_name,
            index,
            seconds,
            "backfilling unmatched end marker from window start"
        ),
        IntervalIssue::BeginOverwritten {
            activity_name,
            previous_start_index,
            index,
        } => debug!(
            activity = %activity_name,
            previous_start_index,
            index,
            "begin marker replaces open interval"
        ),
    }
}
