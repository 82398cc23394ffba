//! Geographic points and trip endpoints
//!
//! A `Location` is immutable once built; the controller replaces it wholesale.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{Error, Result};

/// WGS84 point, longitude first
///
/// Deserialization goes through `Coordinates::new`, so out-of-range input is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    longitude: f64,
    latitude: f64,
}

/// Unchecked wire form of `Coordinates`
#[derive(Deserialize)]
struct RawCoordinates {
    longitude: f64,
    latitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = Error;

    fn try_from(raw: RawCoordinates) -> Result<Self> {
        Coordinates::new(raw.longitude, raw.latitude)
    }
}

impl Coordinates {
    /// Build a validated point
    ///
    /// Fails with `InvalidCoordinate` when either value is out of range or not finite.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self> {
        let lng_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        if !lng_ok || !lat_ok {
            return Err(Error::InvalidCoordinate { longitude, latitude });
        }
        Ok(Self { longitude, latitude })
    }

    /// Build from a `[lng, lat]` pair as used by GeoJSON and the persisted snapshot
    pub fn from_lng_lat(pair: [f64; 2]) -> Result<Self> {
        Self::new(pair[0], pair[1])
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn to_lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A committed trip endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    coordinates: Coordinates,
    name: Option<String>,
}

impl Location {
    pub fn new(coordinates: Coordinates, name: Option<String>) -> Self {
        // Blank names carry no information
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self { coordinates, name }
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for display, falling back to the coordinate pair
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.coordinates.to_string(),
        }
    }
}

/// Which end of the trip an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Pickup,
    Dropoff,
}

impl Endpoint {
    pub fn opposite(self) -> Self {
        match self {
            Endpoint::Pickup => Endpoint::Dropoff,
            Endpoint::Dropoff => Endpoint::Pickup,
        }
    }

    /// Selection mode that picks this endpoint
    pub fn selecting(self) -> SelectionMode {
        match self {
            Endpoint::Pickup => SelectionMode::SelectingPickup,
            Endpoint::Dropoff => SelectionMode::SelectingDropoff,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Pickup => write!(f, "pickup"),
            Endpoint::Dropoff => write!(f, "dropoff"),
        }
    }
}

/// Which point, if any, the user is currently choosing on the map
///
/// Advisory UI state: explicit commits are honored whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Nothing is being chosen
    #[default]
    Idle,
    SelectingPickup,
    SelectingDropoff,
}

impl SelectionMode {
    pub fn is_selecting(self) -> bool {
        self != SelectionMode::Idle
    }

    /// Endpoint being chosen, if any
    pub fn target(self) -> Option<Endpoint> {
        match self {
            SelectionMode::Idle => None,
            SelectionMode::SelectingPickup => Some(Endpoint::Pickup),
            SelectionMode::SelectingDropoff => Some(Endpoint::Dropoff),
        }
    }
}
