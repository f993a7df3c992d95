//! Configuration for the activity segmenter.

use crate::core::features::TimeAnchor;
use crate::core::intervals::UnmatchedEndPolicy;
use crate::core::sensors::SensorCatalog;
use crate::core::time_encoding::TimeEncoding;
use crate::core::windowing::{
    BoundaryResolver, DurationWindows, FixedCountWindows, GapBoundedWindows, MIN_WINDOW_EVENTS,
};
use crate::stream::{TimestampParser, DEFAULT_TIMESTAMP_FORMATS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default window size for the fixed-count policy.
pub const DEFAULT_WINDOW_SIZE: usize = 10;
/// Default target duration for the duration policy, in seconds.
pub const DEFAULT_TARGET_SECS: f64 = 300.0;
/// Default tolerance for the duration policy, in seconds.
pub const DEFAULT_TOLERANCE_SECS: f64 = 30.0;
/// Default number of events scanned before a duration window is force-closed.
pub const DEFAULT_MAX_SCAN_EVENTS: usize = 1000;
/// Longest accepted target duration for the duration policy, in seconds (one year).
pub const MAX_TARGET_SECS: f64 = 365.0 * 86_400.0;
/// Default chunk size for the gap-bounded policy.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// How the stream is cut into windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Windows of exactly `window_size` events
    FixedCount {
        window_size: usize,
        /// Emit the final short window instead of dropping it
        #[serde(default)]
        emit_partial: bool,
    },
    /// Windows of roughly `target_duration`, within `tolerance`
    Duration {
        #[serde(rename = "target_duration_seconds", with = "duration_serde")]
        target_duration: chrono::Duration,
        #[serde(rename = "tolerance_seconds", with = "duration_serde")]
        tolerance: chrono::Duration,
        #[serde(default = "default_max_scan_events")]
        max_scan_events: usize,
    },
    /// Windows over the unannotated runs between activities
    GapBounded {
        #[serde(default)]
        chunk_size: Option<usize>,
    },
}

fn default_max_scan_events() -> usize {
    DEFAULT_MAX_SCAN_EVENTS
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy::Duration {
            target_duration: duration_serde::from_secs_f64(DEFAULT_TARGET_SECS),
            tolerance: duration_serde::from_secs_f64(DEFAULT_TOLERANCE_SECS),
            max_scan_events: DEFAULT_MAX_SCAN_EVENTS,
        }
    }
}

impl FromStr for WindowPolicy {
    type Err = ConfigError;

    /// Parse a policy name into that policy with default parameters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed_count" | "count" => Ok(WindowPolicy::FixedCount {
                window_size: DEFAULT_WINDOW_SIZE,
                emit_partial: false,
            }),
            "duration" | "time" => Ok(WindowPolicy::default()),
            "gap_bounded" | "gap" => Ok(WindowPolicy::GapBounded {
                chunk_size: Some(DEFAULT_CHUNK_SIZE),
            }),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Parameter overrides, typically from the command line.
///
/// An override that does not apply to the selected policy is ignored.
#[derive(Debug, Clone, Default)]
pub struct PolicyOverrides {
    pub window_size: Option<usize>,
    pub emit_partial: Option<bool>,
    pub target_secs: Option<f64>,
    pub tolerance_secs: Option<f64>,
    pub chunk_size: Option<usize>,
}

impl WindowPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            WindowPolicy::FixedCount { .. } => "fixed_count",
            WindowPolicy::Duration { .. } => "duration",
            WindowPolicy::GapBounded { .. } => "gap_bounded",
        }
    }

    /// Unmatched-end handling used when the config does not set one.
    pub fn default_unmatched_end(&self) -> UnmatchedEndPolicy {
        match self {
            WindowPolicy::Duration { .. } => UnmatchedEndPolicy::BackfillFromWindowStart,
            WindowPolicy::FixedCount { .. } | WindowPolicy::GapBounded { .. } => {
                UnmatchedEndPolicy::Drop
            }
        }
    }

    pub fn with_overrides(mut self, overrides: &PolicyOverrides) -> Self {
        match &mut self {
            WindowPolicy::FixedCount {
                window_size,
                emit_partial,
            } => {
                if let Some(n) = overrides.window_size {
                    *window_size = n;
                }
                if let Some(p) = overrides.emit_partial {
                    *emit_partial = p;
                }
            }
            WindowPolicy::Duration {
                target_duration,
                tolerance,
                ..
            } => {
                if let Some(secs) = overrides.target_secs {
                    *target_duration = duration_serde::from_secs_f64(secs);
                }
                if let Some(secs) = overrides.tolerance_secs {
                    *tolerance = duration_serde::from_secs_f64(secs);
                }
            }
            WindowPolicy::GapBounded { chunk_size } => {
                if let Some(n) = overrides.chunk_size {
                    *chunk_size = Some(n);
                }
            }
        }
        self
    }

    /// Check the policy parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            WindowPolicy::FixedCount { window_size, .. } => {
                if *window_size < MIN_WINDOW_EVENTS {
                    return Err(ConfigError::WindowTooSmall(*window_size));
                }
            }
            WindowPolicy::Duration {
                target_duration,
                tolerance,
                max_scan_events,
            } => {
                let target = duration_serde::as_secs_f64(target_duration);
                let tolerance = duration_serde::as_secs_f64(tolerance);
                if target <= 0.0 {
                    return Err(ConfigError::NonPositiveTarget(target));
                }
                if target > MAX_TARGET_SECS {
                    return Err(ConfigError::TargetTooLarge(target));
                }
                if tolerance < 0.0 {
                    return Err(ConfigError::NegativeTolerance(tolerance));
                }
                if tolerance >= target {
                    return Err(ConfigError::ToleranceNotBelowTarget { tolerance, target });
                }
                if *max_scan_events < MIN_WINDOW_EVENTS {
                    return Err(ConfigError::ScanLimitTooSmall(*max_scan_events));
                }
            }
            WindowPolicy::GapBounded { chunk_size } => {
                if *chunk_size == Some(0) {
                    return Err(ConfigError::ZeroChunkSize);
                }
            }
        }
        Ok(())
    }

    /// Build the boundary resolver for this policy.
    pub fn build_resolver(&self) -> BoundaryResolver {
        match self {
            WindowPolicy::FixedCount {
                window_size,
                emit_partial,
            } => BoundaryResolver::FixedCount(FixedCountWindows::new(*window_size, *emit_partial)),
            WindowPolicy::Duration {
                target_duration,
                tolerance,
                max_scan_events,
            } => BoundaryResolver::Duration(DurationWindows::new(
                *target_duration,
                *tolerance,
                *max_scan_events,
            )),
            WindowPolicy::GapBounded { chunk_size } => {
                BoundaryResolver::GapBounded(GapBoundedWindows::new(*chunk_size))
            }
        }
    }
}

/// Main configuration for the segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Window policy and its parameters
    #[serde(default)]
    pub window: WindowPolicy,

    /// Unmatched-end handling; the policy's default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmatched_end: Option<UnmatchedEndPolicy>,

    /// Sensors that get a count column, and which states count as active
    #[serde(default)]
    pub sensors: SensorCatalog,

    /// Which cyclical time components are encoded
    #[serde(default)]
    pub time_encoding: TimeEncoding,

    /// What the time features describe
    #[serde(default)]
    pub time_anchor: TimeAnchor,

    /// Track activity intervals and emit labels
    #[serde(default = "default_labeled")]
    pub labeled: bool,

    /// Timestamp formats tried in order
    #[serde(default = "default_timestamp_formats")]
    pub timestamp_formats: Vec<String>,
}

fn default_labeled() -> bool {
    true
}

fn default_timestamp_formats() -> Vec<String> {
    DEFAULT_TIMESTAMP_FORMATS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowPolicy::default(),
            unmatched_end: None,
            sensors: SensorCatalog::default(),
            time_encoding: TimeEncoding::default(),
            time_anchor: TimeAnchor::default(),
            labeled: default_labeled(),
            timestamp_formats: default_timestamp_formats(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if there is none.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to a specific file, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-segmenter")
            .join("config.json")
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate()?;
        if self.sensors.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        if self.timestamp_formats.is_empty() {
            return Err(ConfigError::NoTimestampFormats);
        }
        Ok(())
    }

    pub fn unmatched_end_policy(&self) -> UnmatchedEndPolicy {
        self.unmatched_end
            .unwrap_or_else(|| self.window.default_unmatched_end())
    }

    pub fn timestamp_parser(&self) -> TimestampParser {
        TimestampParser::new(self.timestamp_formats.clone())
    }

    pub fn build_resolver(&self) -> BoundaryResolver {
        self.window.build_resolver()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("unknown window policy '{0}' (expected fixed_count, duration or gap_bounded)")]
    UnknownPolicy(String),
    #[error("target duration must be positive, got {0}s")]
    NonPositiveTarget(f64),
    #[error("target duration must be at most one year, got {0}s")]
    TargetTooLarge(f64),
    #[error("tolerance must not be negative, got {0}s")]
    NegativeTolerance(f64),
    #[error("tolerance ({tolerance}s) must be smaller than the target duration ({target}s)")]
    ToleranceNotBelowTarget { tolerance: f64, target: f64 },
    #[error("window size must be at least 2, got {0}")]
    WindowTooSmall(usize),
    #[error("scan limit must be at least 2, got {0}")]
    ScanLimitTooSmall(usize),
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    #[error("sensor catalog is empty")]
    EmptyCatalog,
    #[error("no timestamp formats configured")]
    NoTimestampFormats,
}

/// Serde support for signed durations as fractional seconds.
mod duration_serde {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn from_secs_f64(secs: f64) -> chrono::Duration {
        chrono::Duration::microseconds((secs * 1_000_000.0).round() as i64)
    }

    pub fn as_secs_f64(duration: &chrono::Duration) -> f64 {
        match duration.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => duration.num_seconds() as f64,
        }
    }

    pub fn serialize<S>(duration: &chrono::Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        as_secs_f64(duration).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<chrono::Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(de::Error::custom("duration must be a finite number of seconds"));
        }
        Ok(from_secs_f64(secs))
    }
}
