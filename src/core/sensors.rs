//! Sensor activation counting.
//!
//! Counts, for a fixed ordered catalog of sensor ids, how many events in a
//! window report an "active" state. What counts as active can differ by
//! sensor class (the alphabetic prefix of the id, e.g. `M` or `D`).

use crate::stream::{Event, SensorState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Which raw states count as an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStates {
    /// States used for any sensor class without an override
    pub default: Vec<String>,
    /// Per-class overrides keyed by id prefix
    #[serde(default)]
    pub by_class: BTreeMap<String, Vec<String>>,
}

impl Default for ActiveStates {
    fn default() -> Self {
        Self {
            default: vec!["ON".to_string(), "OPEN".to_string()],
            by_class: BTreeMap::new(),
        }
    }
}

impl ActiveStates {
    /// Override the active states for one sensor class.
    pub fn with_class(mut self, class: &str, states: &[&str]) -> Self {
        self.by_class.insert(
            class.to_string(),
            states.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn states_for(&self, sensor_id: &str) -> &[String] {
        self.by_class
            .get(sensor_class(sensor_id))
            .unwrap_or(&self.default)
    }

    /// Whether `state` counts as an activation for `sensor_id`.
    pub fn is_active(&self, sensor_id: &str, state: &SensorState) -> bool {
        let label = state.label();
        self.states_for(sensor_id)
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&label))
    }
}

/// The alphabetic prefix of a sensor id (`M012` -> `M`).
pub fn sensor_class(sensor_id: &str) -> &str {
    let end = sensor_id
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(sensor_id.len());
    &sensor_id[..end]
}

/// The ordered list of sensors that get a count slot in every feature vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorCatalog {
    pub sensors: Vec<String>,
    #[serde(default)]
    pub active_states: ActiveStates,
}

impl Default for SensorCatalog {
    /// Motion sensors M001-M031 and doors D001, D003, D004.
    fn default() -> Self {
        let mut sensors: Vec<String> = (1..=31).map(|i| format!("M{i:03}")).collect();
        sensors.extend(["D001", "D003", "D004"].iter().map(|s| s.to_string()));
        Self::new(sensors)
    }
}

impl SensorCatalog {
    pub fn new(sensors: Vec<String>) -> Self {
        Self {
            sensors,
            active_states: ActiveStates::default(),
        }
    }

    pub fn with_active_states(mut self, active_states: ActiveStates) -> Self {
        self.active_states = active_states;
        self
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Count activations per catalog sensor. Ids not in the catalog are ignored.
    pub fn count_activations(&self, events: &[Event]) -> Vec<u32> {
        let slots: HashMap<&str, usize> = self
            .sensors
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut counts = vec![0u32; self.sensors.len()];
        for event in events {
            if let Some(&slot) = slots.get(event.sensor_id.as_str()) {
                if self.active_states.is_active(&event.sensor_id, &event.state) {
                    counts[slot] += 1;
                }
            }
        }
        counts
    }
}
