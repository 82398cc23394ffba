//! Traffic congestion classification
//!
//! Maps the ratio of current to free-flow speed onto an ordinal level.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal congestion level for a road segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Free,
    Moderate,
    Slow,
    Heavy,
    Severe,
    Unknown,
}

impl CongestionLevel {
    /// Severity rank, 0 for free flowing up to 4 for severe. `None` when unknown.
    pub fn rank(self) -> Option<u8> {
        match self {
            CongestionLevel::Free => Some(0),
            CongestionLevel::Moderate => Some(1),
            CongestionLevel::Slow => Some(2),
            CongestionLevel::Heavy => Some(3),
            CongestionLevel::Severe => Some(4),
            CongestionLevel::Unknown => None,
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CongestionLevel::Free => "free",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Slow => "slow",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::Severe => "severe",
            CongestionLevel::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Congestion observed for one route step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CongestionSample {
    pub level: CongestionLevel,
    pub current_speed_kmh: Option<f64>,
}

impl CongestionSample {
    /// Sample used when the traffic provider has nothing for the step
    pub fn unknown() -> Self {
        Self {
            level: CongestionLevel::Unknown,
            current_speed_kmh: None,
        }
    }

    pub fn from_speeds(current_speed_kmh: Option<f64>, free_flow_speed_kmh: Option<f64>) -> Self {
        Self {
            level: classify(current_speed_kmh, free_flow_speed_kmh),
            current_speed_kmh,
        }
    }
}

/// Classify a segment from its current and free-flow speeds
///
/// Bands are closed on their lower bound: 0.8 is free, 0.6 moderate, 0.4 slow,
/// 0.2 heavy, anything below severe. Missing speeds or a zero free-flow speed
/// give `Unknown`.
pub fn classify(current_speed: Option<f64>, free_flow_speed: Option<f64>) -> CongestionLevel {
    let (current, free_flow) = match (current_speed, free_flow_speed) {
        (Some(c), Some(f)) => (c, f),
        _ => return CongestionLevel::Unknown,
    };
    if !current.is_finite() || !free_flow.is_finite() || current < 0.0 || free_flow <= 0.0 {
        return CongestionLevel::Unknown;
    }

    let ratio = current / free_flow;
    if ratio >= 0.8 {
        CongestionLevel::Free
    } else if ratio >= 0.6 {
        CongestionLevel::Moderate
    } else if ratio >= 0.4 {
        CongestionLevel::Slow
    } else if ratio >= 0.2 {
        CongestionLevel::Heavy
    } else {
        CongestionLevel::Severe
    }
}
