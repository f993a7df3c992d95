//! Window boundary resolution.
//!
//! A resolver looks at the event stream from a cursor position and decides
//! where the next window lies. Three policies are supported:
//!
//! - [`FixedCountWindows`]: exactly `N` events per window
//! - [`DurationWindows`]: a target wall-clock duration with tolerance
//! - [`GapBoundedWindows`]: the unannotated runs between one activity's end
//!   and the next activity's begin, optionally chunked
//!
//! Windows come out in strictly increasing index order and never overlap.

use crate::stream::{Event, MarkerAction};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Signed seconds from `from` to `to`, with microsecond precision.
pub fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

/// Activities surrounding a gap-bounded window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapContext {
    /// Activity whose `end` marker precedes the gap
    pub preceding_activity: String,
    /// Activity whose `begin` marker follows the gap
    pub following_activity: String,
}

/// A contiguous, inclusive index range over the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start_index: usize,
    pub end_index: usize,
    pub start_timestamp: NaiveDateTime,
    pub end_timestamp: NaiveDateTime,
    /// Set only by the gap-bounded policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<GapContext>,
}

impl Window {
    /// Build a window over `events[start..=end]`.
    ///
    /// Callers guarantee `start <= end < events.len()`.
    pub fn over(events: &[Event], start: usize, end: usize) -> Self {
        Self {
            start_index: start,
            end_index: end,
            start_timestamp: events[start].timestamp,
            end_timestamp: events[end].timestamp,
            gap: None,
        }
    }

    fn with_gap(mut self, gap: Option<GapContext>) -> Self {
        self.gap = gap;
        self
    }

    /// Number of events in the window.
    pub fn event_count(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    pub fn contains_index(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }

    /// Wall-clock span from first to last event.
    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.start_timestamp, self.end_timestamp)
    }

    /// The window's events.
    pub fn slice<'a>(&self, events: &'a [Event]) -> &'a [Event] {
        &events[self.start_index..=self.end_index]
    }
}

/// Why the resolver advanced without producing a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The first event is followed by silence longer than the upper bound
    StaleLeadingEvent,
    /// The candidate window had fewer than two events
    Degenerate,
    /// Fewer than `N` events remained for a fixed-count window
    PartialTail,
}

/// Result of asking a resolver for the next window.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    Window(Window),
    Skip {
        next_cursor: usize,
        reason: SkipReason,
        events: usize,
    },
    Exhausted,
}

/// A window segmentation policy.
pub trait WindowBoundary {
    /// Resolve the window starting at or after `cursor`.
    ///
    /// The returned window (or skip) always moves strictly past `cursor`.
    fn next_boundary(&mut self, events: &[Event], cursor: usize) -> Boundary;

    /// Policy name for logs and reports.
    fn name(&self) -> &'static str;
}

/// Minimum events for a window to be meaningful: a start and an end observation.
pub const MIN_WINDOW_EVENTS: usize = 2;

// ============================================================================
// Fixed-count windows
// ============================================================================

/// Windows of exactly `size` events, stepping by `size`.
#[derive(Debug, Clone)]
pub struct FixedCountWindows {
    size: usize,
    emit_partial: bool,
}

impl FixedCountWindows {
    /// `emit_partial` keeps a shorter final window instead of dropping it.
    pub fn new(size: usize, emit_partial: bool) -> Self {
        Self { size, emit_partial }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl WindowBoundary for FixedCountWindows {
    fn next_boundary(&mut self, events: &[Event], cursor: usize) -> Boundary {
        let remaining = events.len().saturating_sub(cursor);
        if remaining == 0 {
            return Boundary::Exhausted;
        }

        if remaining >= self.size {
            return Boundary::Window(Window::over(events, cursor, cursor + self.size - 1));
        }

        if self.emit_partial && remaining >= MIN_WINDOW_EVENTS {
            return Boundary::Window(Window::over(events, cursor, events.len() - 1));
        }

        Boundary::Skip {
            next_cursor: events.len(),
            reason: if self.emit_partial {
                SkipReason::Degenerate
            } else {
                SkipReason::PartialTail
            },
            events: remaining,
        }
    }

    fn name(&self) -> &'static str {
        "fixed_count"
    }
}

// ============================================================================
// Duration windows
// ============================================================================

/// Windows targeting a wall-clock duration within `[target - tolerance, target + tolerance]`.
#[derive(Debug, Clone)]
pub struct DurationWindows {
    target: Duration,
    tolerance: Duration,
    max_scan_events: usize,
}

impl DurationWindows {
    pub fn new(target: Duration, tolerance: Duration, max_scan_events: usize) -> Self {
        Self {
            target,
            tolerance,
            max_scan_events,
        }
    }

    /// Longest allowed silence between two consecutive events of one window.
    ///
    /// `None` when the bound is not representable, which means unbounded.
    fn upper_bound(&self) -> Option<Duration> {
        self.target.checked_add(&self.tolerance)
    }

    fn lower_bound(&self) -> Option<Duration> {
        self.target.checked_sub(&self.tolerance)
    }
}

impl WindowBoundary for DurationWindows {
    fn next_boundary(&mut self, events: &[Event], cursor: usize) -> Boundary {
        if cursor >= events.len() {
            return Boundary::Exhausted;
        }

        let start = events[cursor].timestamp;
        let upper = self.upper_bound();
        let too_long = |gap: Duration| upper.is_some_and(|u| gap > u);

        // An isolated stale event does not get a window of its own.
        if let Some(next) = events.get(cursor + 1) {
            if too_long(next.timestamp - start) {
                return Boundary::Skip {
                    next_cursor: cursor + 1,
                    reason: SkipReason::StaleLeadingEvent,
                    events: 1,
                };
            }
        }

        // Bounds past the calendar range are never reached.
        let min_end = self
            .lower_bound()
            .and_then(|d| start.checked_add_signed(d));
        let max_end = upper.and_then(|d| start.checked_add_signed(d));
        let scan_limit = cursor.saturating_add(self.max_scan_events);

        let mut end_idx = cursor + 1;
        let mut closed = false;
        while end_idx < events.len() && end_idx < scan_limit {
            let at = events[end_idx].timestamp;

            // A silence gap ends the window at the earlier event.
            if too_long(at - events[end_idx - 1].timestamp) {
                end_idx -= 1;
                closed = true;
                break;
            }

            if min_end.is_some_and(|m| at >= m) {
                if max_end.is_some_and(|m| at > m) {
                    end_idx -= 1;
                }
                closed = true;
                break;
            }

            end_idx += 1;
        }

        // Stream end or scan limit: close at the last scanned event.
        if !closed {
            end_idx -= 1;
        }

        let count = end_idx - cursor + 1;
        if count < MIN_WINDOW_EVENTS {
            return Boundary::Skip {
                next_cursor: end_idx + 1,
                reason: SkipReason::Degenerate,
                events: count,
            };
        }

        Boundary::Window(Window::over(events, cursor, end_idx))
    }

    fn name(&self) -> &'static str {
        "duration"
    }
}

// ============================================================================
// Gap-bounded windows
// ============================================================================

/// Index range of one unannotated gap and its surrounding activities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlabeledGap {
    pub start_index: usize,
    pub end_index: usize,
    pub context: GapContext,
}

/// Find every run of events strictly between an `end` marker and the next `begin` marker.
pub fn find_unlabeled_gaps(events: &[Event]) -> Vec<UnlabeledGap> {
    let markers: Vec<(usize, &str, MarkerAction)> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| {
            e.activity_marker
                .as_ref()
                .map(|m| (i, m.activity_name.as_str(), m.action))
        })
        .collect();

    markers
        .windows(2)
        .filter_map(|pair| {
            let (end_at, preceding, first_action) = pair[0];
            let (begin_at, following, second_action) = pair[1];
            let is_gap = first_action == MarkerAction::End
                && second_action == MarkerAction::Begin
                && begin_at > end_at + 1;
            is_gap.then(|| UnlabeledGap {
                start_index: end_at + 1,
                end_index: begin_at - 1,
                context: GapContext {
                    preceding_activity: preceding.to_string(),
                    following_activity: following.to_string(),
                },
            })
        })
        .collect()
}

/// Split `[start, end]` into `ceil(len / chunk_size)` nearly equal chunks.
///
/// Chunk `i` of `k` covers `[start + i*len/k, start + (i+1)*len/k - 1]`; the
/// last chunk always ends at `end`.
pub fn divide_into_chunks(start: usize, end: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    let total = end - start + 1;
    let chunks = total.div_ceil(chunk_size.max(1)).max(1);

    (0..chunks)
        .map(|i| {
            let chunk_start = start + i * total / chunks;
            let chunk_end = if i == chunks - 1 {
                end
            } else {
                start + (i + 1) * total / chunks - 1
            };
            (chunk_start, chunk_end)
        })
        .collect()
}

/// One window per unannotated gap, or per chunk of a gap when `chunk_size` is set.
#[derive(Debug, Clone)]
pub struct GapBoundedWindows {
    chunk_size: Option<usize>,
    plan: Option<VecDeque<(usize, usize, GapContext)>>,
}

impl GapBoundedWindows {
    pub fn new(chunk_size: Option<usize>) -> Self {
        Self {
            chunk_size,
            plan: None,
        }
    }

    fn plan_chunks(
        events: &[Event],
        chunk_size: Option<usize>,
    ) -> VecDeque<(usize, usize, GapContext)> {
        find_unlabeled_gaps(events)
            .into_iter()
            .flat_map(|gap| {
                let ranges = match chunk_size {
                    Some(size) => divide_into_chunks(gap.start_index, gap.end_index, size),
                    None => vec![(gap.start_index, gap.end_index)],
                };
                ranges
                    .into_iter()
                    .map(move |(s, e)| (s, e, gap.context.clone()))
            })
            .collect()
    }

    /// Forget the planned gaps so the next call re-scans the stream.
    pub fn reset(&mut self) {
        self.plan = None;
    }
}

impl WindowBoundary for GapBoundedWindows {
    fn next_boundary(&mut self, events: &[Event], cursor: usize) -> Boundary {
        let chunk_size = self.chunk_size;
        let plan = self
            .plan
            .get_or_insert_with(|| Self::plan_chunks(events, chunk_size));

        while let Some((start, end, context)) = plan.pop_front() {
            if start < cursor {
                continue;
            }

            let count = end - start + 1;
            if count < MIN_WINDOW_EVENTS {
                return Boundary::Skip {
                    next_cursor: end + 1,
                    reason: SkipReason::Degenerate,
                    events: count,
                };
            }

            return Boundary::Window(Window::over(events, start, end).with_gap(Some(context)));
        }

        Boundary::Exhausted
    }

    fn name(&self) -> &'static str {
        "gap_bounded"
    }
}

// ============================================================================
// Policy dispatch
// ============================================================================

/// The configured segmentation policy.
#[derive(Debug, Clone)]
pub enum BoundaryResolver {
    FixedCount(FixedCountWindows),
    Duration(DurationWindows),
    GapBounded(GapBoundedWindows),
}

impl BoundaryResolver {
    /// Clear any per-stream state before segmenting a new stream.
    pub fn reset(&mut self) {
        if let BoundaryResolver::GapBounded(gaps) = self {
            gaps.reset();
        }
    }
}

impl WindowBoundary for BoundaryResolver {
    fn next_boundary(&mut self, events: &[Event], cursor: usize) -> Boundary {
        match self {
            BoundaryResolver::FixedCount(p) => p.next_boundary(events, cursor),
            BoundaryResolver::Duration(p) => p.next_boundary(events, cursor),
            BoundaryResolver::GapBounded(p) => p.next_boundary(events, cursor),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BoundaryResolver::FixedCount(p) => p.name(),
            BoundaryResolver::Duration(p) => p.name(),
            BoundaryResolver::GapBounded(p) => p.name(),
        }
    }
}
