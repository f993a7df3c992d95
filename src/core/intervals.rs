//! Activity interval tracking across window boundaries.
//!
//! An activity that has begun but not yet ended is an [`ActivityInterval`].
//! The set of open intervals is the only state carried from one window to the
//! next. [`IntervalTracker::advance`] is a pure transition: it reads the
//! carried set and returns a new one, together with the seconds each activity
//! accrued inside the window.
//!
//! Each open interval keeps an accrual watermark. Partial credit for a window
//! runs from the watermark to the window's last event, and the watermark then
//! moves there, so the credits an interval collects across every window it
//! touches add up to exactly `end - begin`.

use crate::core::windowing::seconds_between;
use crate::stream::{Event, MarkerAction};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An activity instance that has begun but not ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInterval {
    pub activity_name: String,
    /// Stream index of the `begin` marker
    pub start_index: usize,
    pub start_timestamp: NaiveDateTime,
    /// Time up to which this interval has already been credited to a window
    pub accrued_until: NaiveDateTime,
}

impl ActivityInterval {
    pub fn begin(activity_name: &str, start_index: usize, start_timestamp: NaiveDateTime) -> Self {
        Self {
            activity_name: activity_name.to_string(),
            start_index,
            start_timestamp,
            accrued_until: start_timestamp,
        }
    }
}

/// Open intervals keyed by activity name, in the order they were opened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenIntervals {
    intervals: Vec<ActivityInterval>,
}

impl OpenIntervals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn get(&self, activity_name: &str) -> Option<&ActivityInterval> {
        self.intervals
            .iter()
            .find(|i| i.activity_name == activity_name)
    }

    pub fn contains(&self, activity_name: &str) -> bool {
        self.get(activity_name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityInterval> {
        self.intervals.iter()
    }

    /// Names of the open activities in opening order.
    pub fn names(&self) -> Vec<&str> {
        self.intervals
            .iter()
            .map(|i| i.activity_name.as_str())
            .collect()
    }

    /// Open an interval, replacing any open interval of the same name in place.
    ///
    /// Returns the replaced interval.
    pub fn open(&mut self, interval: ActivityInterval) -> Option<ActivityInterval> {
        match self
            .intervals
            .iter_mut()
            .find(|i| i.activity_name == interval.activity_name)
        {
            Some(slot) => Some(std::mem::replace(slot, interval)),
            None => {
                self.intervals.push(interval);
                None
            }
        }
    }

    /// Remove and return the open interval for `activity_name`.
    pub fn close(&mut self, activity_name: &str) -> Option<ActivityInterval> {
        let pos = self
            .intervals
            .iter()
            .position(|i| i.activity_name == activity_name)?;
        Some(self.intervals.remove(pos))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActivityInterval> {
        self.intervals.iter_mut()
    }
}

/// What to do with an `end` marker that has no open interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedEndPolicy {
    /// Ignore the marker
    Drop,
    /// Treat the activity as open since the first event of the current window
    BackfillFromWindowStart,
}

/// Seconds one activity accrued inside a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDuration {
    pub activity_name: String,
    pub seconds: f64,
    /// Earliest start among the intervals that contributed
    pub first_start: NaiveDateTime,
    /// Latest time credited: an end marker, or the window's last event while still open
    pub credited_until: NaiveDateTime,
}

/// Per-activity accrued seconds, in order of first accrual.
///
/// The order is part of the contract: the majority label breaks ties by it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityDurations {
    entries: Vec<ActivityDuration>,
}

impl ActivityDurations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add seconds for an activity, summing with earlier contributions.
    ///
    /// `start` is the contributing interval's begin and `until` the time the
    /// credit runs up to.
    pub fn add(
        &mut self,
        activity_name: &str,
        seconds: f64,
        start: NaiveDateTime,
        until: NaiveDateTime,
    ) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.activity_name == activity_name)
        {
            Some(entry) => {
                entry.seconds += seconds;
                entry.first_start = entry.first_start.min(start);
                entry.credited_until = entry.credited_until.max(until);
            }
            None => self.entries.push(ActivityDuration {
                activity_name: activity_name.to_string(),
                seconds,
                first_start: start,
                credited_until: until,
            }),
        }
    }

    pub fn get(&self, activity_name: &str) -> Option<&ActivityDuration> {
        self.entries
            .iter()
            .find(|e| e.activity_name == activity_name)
    }

    pub fn seconds(&self, activity_name: &str) -> Option<f64> {
        self.get(activity_name).map(|e| e.seconds)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityDuration> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A data-quality condition met while advancing. None of these abort a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalIssue {
    UnmatchedEndDropped {
        activity_name: String,
        index: usize,
    },
    UnmatchedEndBackfilled {
        activity_name: String,
        index: usize,
        seconds: f64,
    },
    /// An end (or window end) earlier than the interval's credited time
    NegativeInterval {
        activity_name: String,
        start_index: usize,
        index: usize,
        seconds: f64,
    },
    BeginOverwritten {
        activity_name: String,
        previous_start_index: usize,
        index: usize,
    },
}

/// Output of one tracker step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalAdvance {
    pub closed_durations: ActivityDurations,
    pub still_open: OpenIntervals,
    pub issues: Vec<IntervalIssue>,
}

/// Turns a window's activity markers into per-activity durations.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTracker {
    unmatched_end: UnmatchedEndPolicy,
}

impl IntervalTracker {
    pub fn new(unmatched_end: UnmatchedEndPolicy) -> Self {
        Self { unmatched_end }
    }

    pub fn unmatched_end_policy(&self) -> UnmatchedEndPolicy {
        self.unmatched_end
    }

    /// Advance the interval state over one window.
    ///
    /// `window_start_index` is the stream index of `window_events[0]`; it is
    /// used only to label intervals and issues with stream positions.
    pub fn advance(
        &self,
        window_events: &[Event],
        window_start_index: usize,
        carried: &OpenIntervals,
    ) -> IntervalAdvance {
        let mut open = carried.clone();
        let mut closed = ActivityDurations::new();
        let mut issues = Vec::new();

        let (Some(first), Some(last)) = (window_events.first(), window_events.last()) else {
            return IntervalAdvance {
                still_open: open,
                ..Default::default()
            };
        };
        let window_start = first.timestamp;

        for (offset, event) in window_events.iter().enumerate() {
            let Some(marker) = &event.activity_marker else {
                continue;
            };
            let index = window_start_index + offset;
            let name = marker.activity_name.as_str();

            match marker.action {
                MarkerAction::Begin => {
                    let interval = ActivityInterval::begin(name, index, event.timestamp);
                    if let Some(previous) = open.open(interval) {
                        issues.push(IntervalIssue::BeginOverwritten {
                            activity_name: name.to_string(),
                            previous_start_index: previous.start_index,
                            index,
                        });
                    }
                }
                MarkerAction::End => match open.close(name) {
                    Some(interval) => {
                        let seconds = seconds_between(interval.accrued_until, event.timestamp);
                        if seconds < 0.0 {
                            issues.push(IntervalIssue::NegativeInterval {
                                activity_name: name.to_string(),
                                start_index: interval.start_index,
                                index,
                                seconds,
                            });
                        } else {
                            closed.add(name, seconds, interval.start_timestamp, event.timestamp);
                        }
                    }
                    None => match self.unmatched_end {
                        UnmatchedEndPolicy::Drop => {
                            issues.push(IntervalIssue::UnmatchedEndDropped {
                                activity_name: name.to_string(),
                                index,
                            });
                        }
                        UnmatchedEndPolicy::BackfillFromWindowStart => {
                            let seconds = seconds_between(window_start, event.timestamp);
                            if seconds < 0.0 {
                                issues.push(IntervalIssue::NegativeInterval {
                                    activity_name: name.to_string(),
                                    start_index: window_start_index,
                                    index,
                                    seconds,
                                });
                            } else {
                                closed.add(name, seconds, window_start, event.timestamp);
                                issues.push(IntervalIssue::UnmatchedEndBackfilled {
                                    activity_name: name.to_string(),
                                    index,
                                    seconds,
                                });
                            }
                        }
                    },
                },
            }
        }

        // Unfinished intervals earn partial credit up to the window's last event.
        let last_index = window_start_index + window_events.len() - 1;
        for interval in open.iter_mut() {
            let seconds = seconds_between(interval.accrued_until, last.timestamp);
            if seconds < 0.0 {
                issues.push(IntervalIssue::NegativeInterval {
                    activity_name: interval.activity_name.clone(),
                    start_index: interval.start_index,
                    index: last_index,
                    seconds,
                });
                continue;
            }
            closed.add(
                &interval.activity_name,
                seconds,
                interval.start_timestamp,
                last.timestamp,
            );
            interval.accrued_until = last.timestamp;
        }

        IntervalAdvance {
            closed_durations: closed,
            still_open: open,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ActivityMarker, SensorState};
    use chrono::{Duration, NaiveDate};

    fn at(seconds: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 11, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + Duration::seconds(seconds)
    }

    fn event(seconds: i64, marker: Option<&str>) -> Event {
        let e = Event::new(at(seconds), "M001", SensorState::On);
        match marker {
            Some(m) => e.with_marker(ActivityMarker::parse(m).unwrap()),
            None => e,
        }
    }

    #[test]
    fn test_begin_and_end_in_one_window() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let events = vec![
            event(0, Some("A,begin")),
            event(5, None),
            event(10, Some("A,end")),
        ];

        let step = tracker.advance(&events, 0, &OpenIntervals::new());
        assert_eq!(step.closed_durations.seconds("A"), Some(10.0));
        assert!(step.still_open.is_empty());
        assert!(step.issues.is_empty());
    }

    #[test]
    fn test_repeated_closures_are_summed() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let events = vec![
            event(0, Some("A,begin")),
            event(3, Some("A,end")),
            event(10, Some("A,begin")),
            event(14, Some("A,end")),
        ];

        let step = tracker.advance(&events, 0, &OpenIntervals::new());
        assert_eq!(step.closed_durations.seconds("A"), Some(7.0));
        assert_eq!(step.closed_durations.len(), 1);
    }

    #[test]
    fn test_unfinished_interval_gets_partial_credit_and_stays_open() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let events = vec![event(0, None), event(4, Some("A,begin")), event(9, None)];

        let step = tracker.advance(&events, 20, &OpenIntervals::new());
        assert_eq!(step.closed_durations.seconds("A"), Some(5.0));
        let open = step.still_open.get("A").unwrap();
        assert_eq!(open.start_index, 21);
        assert_eq!(open.start_timestamp, at(4));
        assert_eq!(open.accrued_until, at(9));

        let credit = step.closed_durations.get("A").unwrap();
        assert_eq!(credit.first_start, at(4));
        assert_eq!(credit.credited_until, at(9));
    }

    #[test]
    fn test_interval_spanning_three_windows_sums_to_total() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let k0 = vec![event(0, None), event(10, Some("A,begin")), event(20, None)];
        let k1 = vec![event(30, None), event(40, None), event(50, None)];
        let k2 = vec![event(60, None), event(75, Some("A,end")), event(80, None)];

        let s0 = tracker.advance(&k0, 0, &OpenIntervals::new());
        assert!(s0.still_open.contains("A"));
        let s1 = tracker.advance(&k1, 3, &s0.still_open);
        assert!(s1.still_open.contains("A"));
        let s2 = tracker.advance(&k2, 6, &s1.still_open);
        assert!(!s2.still_open.contains("A"));

        let total: f64 = [&s0, &s1, &s2]
            .iter()
            .filter_map(|s| s.closed_durations.seconds("A"))
            .sum();
        assert_eq!(total, 65.0);

        // The middle window credits only its share but keeps the original begin.
        let middle = s1.closed_durations.get("A").unwrap();
        assert_eq!(middle.seconds, 30.0);
        assert_eq!(middle.first_start, at(10));
        assert_eq!(middle.credited_until, at(50));
    }

    #[test]
    fn test_carried_state_is_not_mutated() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let mut carried = OpenIntervals::new();
        carried.open(ActivityInterval::begin("A", 0, at(0)));
        let before = carried.clone();

        let step = tracker.advance(&[event(10, Some("A,end"))], 5, &carried);
        assert_eq!(carried, before);
        assert!(step.still_open.is_empty());
        assert_eq!(step.closed_durations.seconds("A"), Some(10.0));
    }

    #[test]
    fn test_unmatched_end_dropped() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let events = vec![event(0, None), event(8, Some("A,end"))];

        let step = tracker.advance(&events, 0, &OpenIntervals::new());
        assert!(step.closed_durations.is_empty());
        assert!(matches!(
            step.issues[0],
            IntervalIssue::UnmatchedEndDropped { index: 1, .. }
        ));
    }

    #[test]
    fn test_unmatched_end_backfilled_from_window_start() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::BackfillFromWindowStart);
        let events = vec![event(2, None), event(8, Some("A,end"))];

        let step = tracker.advance(&events, 0, &OpenIntervals::new());
        assert_eq!(step.closed_durations.seconds("A"), Some(6.0));
        assert_eq!(step.closed_durations.get("A").unwrap().first_start, at(2));
    }

    #[test]
    fn test_second_begin_overwrites() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let events = vec![
            event(0, Some("A,begin")),
            event(6, Some("A,begin")),
            event(10, Some("A,end")),
        ];

        let step = tracker.advance(&events, 0, &OpenIntervals::new());
        assert_eq!(step.closed_durations.seconds("A"), Some(4.0));
        assert!(matches!(
            step.issues[0],
            IntervalIssue::BeginOverwritten {
                previous_start_index: 0,
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_end_before_begin_is_reported() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let mut carried = OpenIntervals::new();
        carried.open(ActivityInterval::begin("A", 0, at(100)));

        let step = tracker.advance(&[event(50, Some("A,end"))], 1, &carried);
        assert!(step.closed_durations.is_empty());
        assert!(matches!(
            step.issues[0],
            IntervalIssue::NegativeInterval { seconds, .. } if seconds == -50.0
        ));
    }

    #[test]
    fn test_accrual_order_follows_first_contribution() {
        let tracker = IntervalTracker::new(UnmatchedEndPolicy::Drop);
        let events = vec![
            event(0, Some("B,begin")),
            event(1, Some("A,begin")),
            event(3, Some("A,end")),
            event(5, None),
        ];

        let step = tracker.advance(&events, 0, &OpenIntervals::new());
        let names: Vec<&str> = step
            .closed_durations
            .iter()
            .map(|d| d.activity_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
