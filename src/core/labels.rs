//! Majority label resolution with continuity fallback.

use crate::core::intervals::{ActivityDuration, ActivityDurations};
use serde::{Deserialize, Serialize};

/// Label used when no real activity has been seen yet.
pub const UNKNOWN_LABEL: &str = "unknown";

/// How a window's label was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// The activity with the greatest accrued duration
    Majority,
    /// The previous window's real label
    CarriedForward,
    /// Nothing to go on
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLabel {
    pub label: String,
    pub source: LabelSource,
    /// Accrued seconds of the winning activity; zero unless `source` is `Majority`
    pub majority_seconds: f64,
}

/// The entry with the strictly greatest duration; ties keep the earliest entry.
pub fn majority_activity(durations: &ActivityDurations) -> Option<&ActivityDuration> {
    durations.iter().fold(None, |best, entry| match best {
        Some(b) if b.seconds >= entry.seconds => Some(b),
        _ => Some(entry),
    })
}

/// Picks one label per window and remembers the last real one.
#[derive(Debug, Clone, Default)]
pub struct MajorityLabelResolver {
    last_real: Option<String>,
}

impl MajorityLabelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_label(&self) -> Option<&str> {
        self.last_real.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_real = None;
    }

    pub fn resolve(&mut self, durations: &ActivityDurations) -> ResolvedLabel {
        let resolved = match majority_activity(durations) {
            Some(winner) if winner.activity_name != UNKNOWN_LABEL => ResolvedLabel {
                label: winner.activity_name.clone(),
                source: LabelSource::Majority,
                majority_seconds: winner.seconds,
            },
            _ => self.fallback(),
        };

        if resolved.source == LabelSource::Majority {
            self.last_real = Some(resolved.label.clone());
        }
        resolved
    }

    fn fallback(&self) -> ResolvedLabel {
        match &self.last_real {
            Some(label) => ResolvedLabel {
                label: label.clone(),
                source: LabelSource::CarriedForward,
                majority_seconds: 0.0,
            },
            None => ResolvedLabel {
                label: UNKNOWN_LABEL.to_string(),
                source: LabelSource::Unknown,
                majority_seconds: 0.0,
            },
        }
    }
}
