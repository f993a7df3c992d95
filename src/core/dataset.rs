//! Dataset export.
//!
//! A [`Dataset`] wraps the labeled windows of one run together with the
//! feature layout and run metadata. It can be written as pretty JSON, as
//! JSON lines (one record per line), or as a plain-text dump meant for
//! eyeballing vectors.

use crate::core::engine::{LabeledWindow, SegmentationOutput};
use crate::core::features::FeatureLayout;
use crate::core::stats::SegmentationStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use uuid::Uuid;

/// Version of the dataset JSON layout.
pub const DATASET_FORMAT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "activity-segmenter";

/// Width of the separator line between dump blocks.
pub const DUMP_SEPARATOR_WIDTH: usize = 50;

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    /// Unique id of the run that produced the dataset
    pub run_id: String,
}

/// All vectors of one segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub format_version: String,
    pub producer: Producer,
    pub created_at: DateTime<Utc>,
    /// Name of the window policy used
    pub policy: String,
    pub layout: FeatureLayout,
    /// Whether records carry labels
    pub labeled: bool,
    pub records: Vec<LabeledWindow>,
    pub stats: SegmentationStats,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Feature vectors as rows.
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.records
            .iter()
            .map(|r| r.features.values.clone())
            .collect()
    }

    /// Labels in record order; empty for an unlabeled dataset.
    pub fn labels(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|r| r.label.as_ref().map(|l| l.label.as_str()))
            .collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One JSON object per record, newline-terminated.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the text dump: every vector's named fields, its label, then a separator.
    pub fn write_dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let names = self.layout.names();
        let block = self.layout.time_block_width();
        let duration_at = self.layout.duration_offset();
        let sensors_at = self.layout.sensor_offset();

        for (i, record) in self.records.iter().enumerate() {
            let values = record.features.as_slice();
            writeln!(out, "X[{i}]: [")?;

            writeln!(
                out,
                "    # Time Features ({} features: {block} for start date, {block} for end date)",
                block * 2
            )?;
            for (name, value) in names.iter().zip(values).take(duration_at) {
                writeln!(out, "    '{name}': {value:?},")?;
            }
            writeln!(
                out,
                "    '{}': {:?},  # Normalized activity duration",
                names[duration_at], values[duration_at]
            )?;

            writeln!(out, "    # Sensor Features ({} features)", names.len() - sensors_at)?;
            for (j, (name, value)) in names.iter().zip(values).enumerate().skip(sensors_at) {
                let sep = if j + 1 < names.len() { "," } else { "" };
                writeln!(out, "    '{name}': {value:?}{sep}")?;
            }

            writeln!(out, "]")?;
            if let Some(label) = &record.label {
                writeln!(out, "y[{i}]: '{}'", label.label)?;
            }
            writeln!(out, "{}", "_".repeat(DUMP_SEPARATOR_WIDTH))?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// The dump as a string.
    pub fn dump_string(&self) -> io::Result<String> {
        let mut buf = Vec::new();
        self.write_dump(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Builds datasets stamped with a per-builder run id.
pub struct DatasetBuilder {
    run_id: Uuid,
    policy: String,
    layout: FeatureLayout,
    labeled: bool,
}

impl DatasetBuilder {
    /// Create a builder with a fresh run id.
    pub fn new(policy: &str, layout: FeatureLayout, labeled: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            policy: policy.to_string(),
            layout,
            labeled,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn build(&self, output: SegmentationOutput) -> Dataset {
        Dataset {
            format_version: DATASET_FORMAT_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                run_id: self.run_id.to_string(),
            },
            created_at: Utc::now(),
            policy: self.policy.clone(),
            layout: self.layout.clone(),
            labeled: self.labeled,
            records: output.records,
            stats: output.stats,
        }
    }
}
