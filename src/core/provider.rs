//! External provider contracts
//!
//! Routing, traffic, weather and search providers are consumed through these
//! traits only. Implementations normalize their wire formats into the types
//! below before anything reaches the trip core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::location::Coordinates;

/// One maneuver of a provider route
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStep {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub maneuver_type: String,
    pub instruction: String,
    pub geometry: Vec<Coordinates>,
}

/// A route as returned by the routing provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub geometry: Vec<Coordinates>,
    pub steps: Vec<ProviderStep>,
}

impl ProviderRoute {
    /// Reject negative or non-finite distances and durations
    pub fn validate(&self) -> Result<()> {
        check_measure("route distance", self.distance_meters)?;
        check_measure("route duration", self.duration_seconds)?;
        for (i, step) in self.steps.iter().enumerate() {
            check_measure(&format!("step {i} distance"), step.distance_meters)?;
            check_measure(&format!("step {i} duration"), step.duration_seconds)?;
        }
        Ok(())
    }
}

fn check_measure(what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::HttpError(format!("malformed {what}: {value}")))
    }
}

/// Speeds around a point; either may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficFlow {
    pub current_speed_kmh: Option<f64>,
    pub free_flow_speed_kmh: Option<f64>,
}

/// Current conditions at a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub condition_text: String,
    pub temperature_c: Option<f64>,
    pub humidity_percent: Option<f64>,
}

impl WeatherReport {
    /// Shown when the weather provider is unavailable
    pub fn placeholder() -> Self {
        Self {
            condition_text: "Weather unavailable".to_string(),
            temperature_c: None,
            humidity_percent: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.temperature_c.is_none() && self.humidity_percent.is_none()
    }
}

/// A search or geocoding hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub address: String,
    pub position: Coordinates,
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Driving route between two points; `Ok(None)` when the provider found none
    async fn route(&self, origin: Coordinates, destination: Coordinates) -> Result<Option<ProviderRoute>>;
}

#[async_trait]
pub trait TrafficProvider: Send + Sync {
    /// Flow near a point; `Ok(None)` when no road segment is known there
    async fn flow(&self, at: Coordinates) -> Result<Option<TrafficFlow>>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, at: Coordinates) -> Result<WeatherReport>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, country: &str) -> Result<Vec<Place>>;
}

/// Traffic provider that never knows anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTraffic;

#[async_trait]
impl TrafficProvider for NoTraffic {
    async fn flow(&self, _at: Coordinates) -> Result<Option<TrafficFlow>> {
        Ok(None)
    }
}

/// Weather provider that always reports the placeholder
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWeather;

#[async_trait]
impl WeatherProvider for NoWeather {
    async fn current(&self, _at: Coordinates) -> Result<WeatherReport> {
        Ok(WeatherReport::placeholder())
    }
}
