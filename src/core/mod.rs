//! Core functionality for the activity segmenter.
//!
//! This module contains:
//! - Window boundary resolution under the three window policies
//! - Activity interval tracking across windows and majority labeling
//! - Cyclical time encoding, sensor counting and vector assembly
//! - The engine that ties them together, and dataset export

pub mod dataset;
pub mod engine;
pub mod features;
pub mod intervals;
pub mod labels;
pub mod sensors;
pub mod stats;
pub mod time_encoding;
pub mod windowing;

// Re-export commonly used types
pub use dataset::{Dataset, DatasetBuilder, DATASET_FORMAT_VERSION, PRODUCER_NAME};
pub use engine::{EngineError, LabeledWindow, SegmentationEngine, SegmentationOutput};
pub use features::{
    assemble, normalize_duration, FeatureLayout, FeatureVector, TimeAnchor, TimeSpan,
    DURATION_FEATURE_NAME,
};
pub use intervals::{
    ActivityDurations, ActivityInterval, IntervalAdvance, IntervalIssue, IntervalTracker,
    OpenIntervals, UnmatchedEndPolicy,
};
pub use labels::{LabelSource, MajorityLabelResolver, ResolvedLabel, UNKNOWN_LABEL};
pub use sensors::{ActiveStates, SensorCatalog};
pub use stats::{DurationSummary, SegmentationStats};
pub use time_encoding::{encode_cyclical, encode_timestamp, TimeComponent, TimeEncoding};
pub use windowing::{Boundary, BoundaryResolver, SkipReason, Window, WindowBoundary};
