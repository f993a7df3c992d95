//! Run statistics for a segmentation pass.
//!
//! Counts what the engine read, emitted, skipped and repaired, so a dataset
//! can be audited without re-reading the raw log.

use crate::core::intervals::IntervalIssue;
use crate::core::labels::{LabelSource, ResolvedLabel};
use crate::core::windowing::SkipReason;
use crate::stream::IngestReport;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationStats {
    /// Raw records read from the input
    pub records_read: u64,
    /// Records that became events
    pub events_ingested: u64,
    /// Records dropped for an unparseable timestamp
    pub timestamp_failures: u64,
    /// Events whose activity marker was ignored
    pub malformed_markers: u64,
    pub windows_emitted: u64,
    /// Candidate windows with fewer than two events
    pub degenerate_windows: u64,
    /// Fixed-count tails shorter than the window size
    pub partial_tails_dropped: u64,
    /// Leading events skipped by the duration policy
    pub stale_events_skipped: u64,
    pub unmatched_ends_dropped: u64,
    pub unmatched_ends_backfilled: u64,
    pub negative_intervals: u64,
    pub begins_overwritten: u64,
    pub labels_carried_forward: u64,
    pub labels_unknown: u64,
    /// Emitted windows per label
    pub label_counts: BTreeMap<String, u64>,
    #[serde(skip)]
    window_durations: Vec<f64>,
}

/// Spread of emitted window durations, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; zero for a single window
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl DurationSummary {
    pub fn from_seconds(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = if values.len() < 2 {
            0.0
        } else {
            Statistics::std_dev(values)
        };
        Some(Self {
            count: values.len(),
            mean: Statistics::mean(values),
            std_dev,
            min: Statistics::min(values),
            max: Statistics::max(values),
        })
    }
}

impl SegmentationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingest(&mut self, report: &IngestReport) {
        self.records_read += report.records_read;
        self.events_ingested += report.records_read - report.timestamp_failures;
        self.timestamp_failures += report.timestamp_failures;
        self.malformed_markers += report.malformed_markers;
    }

    /// Count events handed to the engine directly, without a raw-record pass.
    pub fn record_events(&mut self, count: usize) {
        self.events_ingested += count as u64;
    }

    pub fn record_window(&mut self, duration_seconds: f64) {
        self.windows_emitted += 1;
        self.window_durations.push(duration_seconds);
    }

    pub fn record_skip(&mut self, reason: SkipReason, events: usize) {
        match reason {
            SkipReason::StaleLeadingEvent => self.stale_events_skipped += events as u64,
            SkipReason::Degenerate => self.degenerate_windows += 1,
            SkipReason::PartialTail => self.partial_tails_dropped += 1,
        }
    }

    pub fn record_issue(&mut self, issue: &IntervalIssue) {
        match issue {
            IntervalIssue::UnmatchedEndDropped { .. } => self.unmatched_ends_dropped += 1,
            IntervalIssue::UnmatchedEndBackfilled { .. } => self.unmatched_ends_backfilled += 1,
            IntervalIssue::NegativeInterval { .. } => self.negative_intervals += 1,
            IntervalIssue::BeginOverwritten { .. } => self.begins_overwritten += 1,
        }
    }

    pub fn record_label(&mut self, label: &ResolvedLabel) {
        match label.source {
            LabelSource::Majority => {}
            LabelSource::CarriedForward => self.labels_carried_forward += 1,
            LabelSource::Unknown => self.labels_unknown += 1,
        }
        *self.label_counts.entry(label.label.clone()).or_insert(0) += 1;
    }

    pub fn duration_summary(&self) -> Option<DurationSummary> {
        DurationSummary::from_seconds(&self.window_durations)
    }

    /// Share of labeled windows per label, most frequent first.
    pub fn label_distribution(&self) -> Vec<(String, f64)> {
        let total: u64 = self.label_counts.values().sum();
        if total == 0 {
            return Vec::new();
        }
        let mut shares: Vec<(String, f64)> = self
            .label_counts
            .iter()
            .map(|(label, count)| (label.clone(), *count as f64 / total as f64))
            .collect();
        // Stable sort keeps alphabetical order among equal shares.
        shares.sort_by(|a, b| b.1.total_cmp(&a.1));
        shares
    }

    /// Human-readable report for the CLI.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Segmentation Statistics:\n\
             - Records read: {}\n\
             - Events ingested: {}\n\
             - Timestamp failures: {}\n\
             - Malformed markers: {}\n\
             - Windows emitted: {}\n\
             - Degenerate windows dropped: {}\n\
             - Partial tails dropped: {}\n\
             - Stale events skipped: {}\n\
             - Unmatched ends dropped: {}\n\
             - Unmatched ends backfilled: {}\n\
             - Negative intervals: {}\n\
             - Begins overwritten: {}\n\
             - Labels carried forward: {}\n\
             - Unknown labels: {}",
            self.records_read,
            self.events_ingested,
            self.timestamp_failures,
            self.malformed_markers,
            self.windows_emitted,
            self.degenerate_windows,
            self.partial_tails_dropped,
            self.stale_events_skipped,
            self.unmatched_ends_dropped,
            self.unmatched_ends_backfilled,
            self.negative_intervals,
            self.begins_overwritten,
            self.labels_carried_forward,
            self.labels_unknown,
        );

        if let Some(d) = self.duration_summary() {
            out.push_str(&format!(
                "\n\nWindow Durations (seconds):\n\
                 - Mean: {:.1}\n\
                 - Std dev: {:.1}\n\
                 - Min: {:.1}\n\
                 - Max: {:.1}",
                d.mean, d.std_dev, d.min, d.max
            ));
        }

        let distribution = self.label_distribution();
        if !distribution.is_empty() {
            out.push_str("\n\nLabel Distribution:");
            for (label, share) in distribution {
                out.push_str(&format!("\n- {label}: {:.1}%", share * 100.0));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str, source: LabelSource) -> ResolvedLabel {
        ResolvedLabel {
            label: name.to_string(),
            source,
            majority_seconds: 0.0,
        }
    }

    #[test]
    fn test_record_ingest() {
        let mut stats = SegmentationStats::new();
        stats.record_ingest(&IngestReport {
            records_read: 10,
            timestamp_failures: 2,
            malformed_markers: 1,
        });
        assert_eq!(stats.records_read, 10);
        assert_eq!(stats.events_ingested, 8);
        assert_eq!(stats.timestamp_failures, 2);
        assert_eq!(stats.malformed_markers, 1);
    }

    #[test]
    fn test_record_skips_and_issues() {
        let mut stats = SegmentationStats::new();
        stats.record_skip(SkipReason::StaleLeadingEvent, 1);
        stats.record_skip(SkipReason::StaleLeadingEvent, 1);
        stats.record_skip(SkipReason::Degenerate, 1);
        stats.record_issue(&IntervalIssue::UnmatchedEndDropped {
            activity_name: "A".into(),
            index: 3,
        });

        assert_eq!(stats.stale_events_skipped, 2);
        assert_eq!(stats.degenerate_windows, 1);
        assert_eq!(stats.unmatched_ends_dropped, 1);
    }

    #[test]
    fn test_duration_summary() {
        let mut stats = SegmentationStats::new();
        assert!(stats.duration_summary().is_none());

        stats.record_window(100.0);
        let single = stats.duration_summary().unwrap();
        assert_eq!(single.std_dev, 0.0);

        stats.record_window(300.0);
        let d = stats.duration_summary().unwrap();
        assert_eq!(d.count, 2);
        assert_eq!(d.mean, 200.0);
        assert_eq!(d.min, 100.0);
        assert_eq!(d.max, 300.0);
        assert!((d.std_dev - 141.421_356).abs() < 1e-5);
    }

    #[test]
    fn test_label_distribution() {
        let mut stats = SegmentationStats::new();
        stats.record_label(&label("Relax", LabelSource::Majority));
        stats.record_label(&label("Relax", LabelSource::CarriedForward));
        stats.record_label(&label("Sleeping", LabelSource::Majority));
        stats.record_label(&label("Relax", LabelSource::Majority));

        let dist = stats.label_distribution();
        assert_eq!(dist[0].0, "Relax");
        assert!((dist[0].1 - 0.75).abs() < 1e-12);
        assert_eq!(stats.labels_carried_forward, 1);
    }

    #[test]
    fn test_summary_mentions_counters() {
        let mut stats = SegmentationStats::new();
        stats.record_window(60.0);
        stats.record_label(&label("Relax", LabelSource::Majority));
        let summary = stats.summary();
        assert!(summary.contains("Windows emitted: 1"));
        assert!(summary.contains("Relax: 100.0%"));
    }
}
