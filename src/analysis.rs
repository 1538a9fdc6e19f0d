//! Traffic density analysis over a frame's confirmed detections.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TrackedDetection;

/// Classes relevant to traffic monitoring.
pub const TRAFFIC_CLASSES: [&str; 6] = ["car", "truck", "bus", "motorcycle", "bicycle", "person"];

/// Classes that count towards [`TrafficAnalysis::vehicle_count`].
pub const VEHICLE_CLASSES: [&str; 3] = ["car", "truck", "bus"];

/// Vehicle count at or above which density is [`TrafficDensity::Moderate`].
pub const MODERATE_DENSITY_VEHICLES: usize = 5;

/// Vehicle count at or above which density is [`TrafficDensity::High`].
pub const HIGH_DENSITY_VEHICLES: usize = 10;

/// Case-insensitive membership in [`TRAFFIC_CLASSES`].
pub fn is_traffic_class(label: &str) -> bool {
    TRAFFIC_CLASSES.iter().any(|c| c.eq_ignore_ascii_case(label))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficDensity {
    Low,
    Moderate,
    High,
}

impl TrafficDensity {
    pub fn from_vehicle_count(vehicles: usize) -> Self {
        if vehicles >= HIGH_DENSITY_VEHICLES {
            Self::High
        } else if vehicles >= MODERATE_DENSITY_VEHICLES {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl fmt::Display for TrafficDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-frame traffic summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficAnalysis {
    pub density: TrafficDensity,

    /// Cars, trucks and buses in the frame.
    pub vehicle_count: usize,

    /// Every traffic class, lowercase, zero-filled. Non-traffic labels are
    /// listed only if present.
    pub counts_by_type: BTreeMap<String, usize>,
}

impl TrafficAnalysis {
    /// Summarize a frame's reported detections.
    pub fn from_detections(detections: &[TrackedDetection]) -> Self {
        Self::from_labels(detections.iter().map(|d| d.class_label.as_str()))
    }

    /// Summarize from bare class labels.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts_by_type: BTreeMap<String, usize> =
            TRAFFIC_CLASSES.iter().map(|c| (c.to_string(), 0)).collect();
        for label in labels {
            *counts_by_type.entry(label.to_ascii_lowercase()).or_insert(0) += 1;
        }

        let vehicle_count = VEHICLE_CLASSES
            .iter()
            .map(|c| counts_by_type.get(*c).copied().unwrap_or(0))
            .sum();

        Self {
            density: TrafficDensity::from_vehicle_count(vehicle_count),
            vehicle_count,
            counts_by_type,
        }
    }
}
