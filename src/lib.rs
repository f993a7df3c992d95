//! Activity Segmenter - windowed activity segmentation for smart-home sensor logs.
//!
//! This library turns a chronologically ordered log of binary sensor events,
//! sparsely annotated with `begin`/`end` activity markers, into fixed-length
//! feature vectors with one majority-activity label per window.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Activity Segmenter                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐                │
//! │  │   Stream   │──▶│  Boundary  │──▶│  Interval  │──┐             │
//! │  │ (ingest)   │   │  Resolver  │   │  Tracker   │  │             │
//! │  └────────────┘   └────────────┘   └────────────┘  ▼             │
//! │                         │                   ┌────────────┐       │
//! │                         │                   │  Majority  │       │
//! │                         ▼                   │   Label    │       │
//! │                  ┌────────────┐             └────────────┘       │
//! │                  │ Time enc.  │                    │             │
//! │                  │ + counts   │──▶ Feature vector ◀┘             │
//! │                  └────────────┘          │                       │
//! │                                          ▼                       │
//! │                                   ┌────────────┐                 │
//! │                                   │  Dataset   │                 │
//! │                                   └────────────┘                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use activity_segmenter::{stream, Config, DatasetBuilder, SegmentationEngine};
//! use std::path::Path;
//!
//! let config = Config::load().unwrap_or_default();
//! let mut engine = SegmentationEngine::new(&config).expect("invalid config");
//!
//! let records = stream::load_records(Path::new("events.json")).expect("unreadable input");
//! let output = engine.segment_records(&records).expect("empty stream");
//!
//! let builder = DatasetBuilder::new(engine.policy_name(), engine.layout().clone(), true);
//! let dataset = builder.build(output);
//! print!("{}", dataset.dump_string().expect("dump"));
//! ```

pub mod config;
pub mod core;
pub mod stream;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, PolicyOverrides, WindowPolicy};
pub use core::{
    Dataset, DatasetBuilder, EngineError, FeatureLayout, LabeledWindow, SegmentationEngine,
    SegmentationOutput, SegmentationStats,
};
pub use stream::{Event, EventRecord, TimestampParser};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Feature layout declaration that can be displayed to users.
pub const LAYOUT_DECLARATION: &str = r#"
Each window becomes one vector with this fixed column order:

  1. start-time block   sin/cos pairs of the window start
                        (compact: hour, minute, day, month, weekday;
                         full adds second and seconds-since-midnight)
  2. end-time block     same components for the window end
  3. activity_duration_normalized
                        max(seconds / 86400, 0.0001)
  4. sensor counts      activations per catalog sensor, catalog order

Labels are the activity with the longest accrued duration in the window.
Windows with no activity reuse the previous label, or 'unknown' before
any activity has been seen.
"#;
