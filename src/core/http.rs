//! HTTP provider implementations
//!
//! OSRM for routing, TomTom for traffic flow and search, WeatherAPI for
//! current conditions. Wire payloads are decoded into private structs and
//! normalized into the provider types; nothing here is retried.

use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::core::config::ProviderConfig;
use crate::core::error::{Error, Result};
use crate::core::location::Coordinates;
use crate::core::provider::{
    Place, ProviderRoute, ProviderStep, RoutingProvider, SearchProvider, TrafficFlow,
    TrafficProvider, WeatherProvider, WeatherReport,
};

/// Shared HTTP client
static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(format!("tripfare/{}", env!("TRIPFARE_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
});

fn client() -> &'static Client {
    &GLOBAL_CLIENT
}

fn parse_base(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| Error::InvalidInput(format!("bad provider URL '{base}': {e}")))
}

fn to_coordinates(pair: [f64; 2]) -> Result<Coordinates> {
    Coordinates::from_lng_lat(pair)
        .map_err(|_| Error::HttpError(format!("malformed coordinate [{}, {}]", pair[0], pair[1])))
}

fn to_line(points: &[[f64; 2]]) -> Result<Vec<Coordinates>> {
    points.iter().copied().map(to_coordinates).collect()
}

// ---------------------------------------------------------------------------
// OSRM routing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    #[serde(default)]
    geometry: Option<GeoJsonLine>,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct GeoJsonLine {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
    #[serde(default)]
    geometry: Option<GeoJsonLine>,
}

#[derive(Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    location: Option<[f64; 2]>,
}

/// Routing through an OSRM-compatible `route/v1` endpoint
pub struct OsrmRouter {
    base_url: String,
    timeout: Duration,
}

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: ProviderConfig::default().request_timeout,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.osrm_base_url.clone(),
            timeout: config.request_timeout,
        }
    }

    fn route_url(&self, origin: Coordinates, destination: Coordinates) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url.trim_end_matches('/'),
            origin.longitude(),
            origin.latitude(),
            destination.longitude(),
            destination.latitude()
        )
    }
}

#[async_trait]
impl RoutingProvider for OsrmRouter {
    async fn route(&self, origin: Coordinates, destination: Coordinates) -> Result<Option<ProviderRoute>> {
        let url = self.route_url(origin, destination);
        debug!("OSRM route request: {url}");

        let response = client()
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson"), ("steps", "true")])
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        // OSRM reports "NoRoute" with a 400 status, so decode before checking it
        let parsed: OsrmResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(Error::HttpError(format!("undecodable OSRM response: {e}")))
            }
            Err(_) => return Err(Error::HttpError(format!("OSRM request failed: {status}"))),
        };

        match parsed.code.as_str() {
            "Ok" => {}
            "NoRoute" => return Ok(None),
            code => {
                let message = parsed.message.unwrap_or_default();
                return Err(Error::HttpError(format!("OSRM returned {code}: {message}")));
            }
        }

        let Some(route) = parsed.routes.into_iter().next() else {
            return Ok(None);
        };
        normalize_osrm_route(route).map(Some)
    }
}

fn normalize_osrm_route(route: OsrmRoute) -> Result<ProviderRoute> {
    let geometry = match &route.geometry {
        Some(line) => to_line(&line.coordinates)?,
        None => Vec::new(),
    };

    let mut steps = Vec::new();
    for step in route.legs.into_iter().flat_map(|leg| leg.steps) {
        let mut step_geometry = match &step.geometry {
            Some(line) => to_line(&line.coordinates)?,
            None => Vec::new(),
        };
        if step_geometry.is_empty() {
            if let Some(location) = step.maneuver.location {
                step_geometry.push(to_coordinates(location)?);
            }
        }

        let instruction = step
            .maneuver
            .instruction
            .clone()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| {
                describe_maneuver(&step.maneuver.kind, step.maneuver.modifier.as_deref(), &step.name)
            });

        steps.push(ProviderStep {
            distance_meters: step.distance,
            duration_seconds: step.duration,
            maneuver_type: step.maneuver.kind,
            instruction,
            geometry: step_geometry,
        });
    }

    let route = ProviderRoute {
        distance_meters: route.distance,
        duration_seconds: route.duration,
        geometry,
        steps,
    };
    route.validate()?;
    Ok(route)
}

/// Human-readable instruction for an OSRM maneuver without one
pub fn describe_maneuver(kind: &str, modifier: Option<&str>, road: &str) -> String {
    let action = match (kind, modifier) {
        ("depart", _) => "Depart".to_string(),
        ("arrive", _) => return "Arrive at destination".to_string(),
        ("roundabout" | "rotary", _) => "Enter the roundabout".to_string(),
        ("merge", _) => "Merge".to_string(),
        (_, Some("uturn")) => "Make a U-turn".to_string(),
        (_, Some("straight")) | ("continue" | "new name", None) => "Continue straight".to_string(),
        ("continue" | "new name", Some(m)) => format!("Continue {m}"),
        (_, Some(m)) => format!("Turn {m}"),
        (other, None) => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Continue".to_string(),
            }
        }
    };

    if road.trim().is_empty() {
        action
    } else {
        format!("{action} onto {}", road.trim())
    }
}

// ---------------------------------------------------------------------------
// TomTom traffic flow
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FlowResponse {
    #[serde(rename = "flowSegmentData")]
    flow_segment_data: Option<FlowSegment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegment {
    #[serde(default)]
    current_speed: Option<f64>,
    #[serde(default)]
    free_flow_speed: Option<f64>,
}

/// Traffic flow from TomTom `flowSegmentData`
pub struct TomTomTraffic {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl TomTomTraffic {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: ProviderConfig::default().request_timeout,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.tomtom_base_url.clone(),
            api_key: config.tomtom_api_key.clone(),
            timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl TrafficProvider for TomTomTraffic {
    async fn flow(&self, at: Coordinates) -> Result<Option<TrafficFlow>> {
        let Some(key) = &self.api_key else {
            return Ok(None);
        };

        let url = format!(
            "{}/traffic/services/4/flowSegmentData/absolute/10/json",
            self.base_url.trim_end_matches('/')
        );
        let point = format!("{},{}", at.latitude(), at.longitude());
        let response = client()
            .get(&url)
            .query(&[("point", point.as_str()), ("unit", "KMPH"), ("key", key.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;

        // No road segment near the point
        if matches!(response.status(), StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND) {
            debug!("No traffic segment near {at}");
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::HttpError(format!("traffic request failed: {status}")));
        }

        let parsed: FlowResponse = response.json().await?;
        Ok(parsed.flow_segment_data.map(|segment| TrafficFlow {
            current_speed_kmh: segment.current_speed,
            free_flow_speed_kmh: segment.free_flow_speed,
        }))
    }
}

// ---------------------------------------------------------------------------
// WeatherAPI current conditions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WeatherResponse {
    current: WeatherCurrent,
}

#[derive(Deserialize)]
struct WeatherCurrent {
    #[serde(default)]
    temp_c: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    condition: WeatherCondition,
}

#[derive(Deserialize)]
struct WeatherCondition {
    text: String,
}

/// Current conditions from WeatherAPI `current.json`
pub struct WeatherApi {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl WeatherApi {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: ProviderConfig::default().request_timeout,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.weather_base_url.clone(),
            api_key: config.weather_api_key.clone(),
            timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherApi {
    async fn current(&self, at: Coordinates) -> Result<WeatherReport> {
        let Some(key) = &self.api_key else {
            return Ok(WeatherReport::placeholder());
        };

        let url = format!("{}/v1/current.json", self.base_url.trim_end_matches('/'));
        let q = format!("{},{}", at.latitude(), at.longitude());
        let response = client()
            .get(&url)
            .query(&[("key", key.as_str()), ("q", q.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::HttpError(format!("weather request failed: {status}")));
        }

        let parsed: WeatherResponse = response.json().await?;
        Ok(WeatherReport {
            condition_text: parsed.current.condition.text,
            temperature_c: parsed.current.temp_c,
            humidity_percent: parsed.current.humidity,
        })
    }
}

// ---------------------------------------------------------------------------
// TomTom search
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    poi: Option<SearchPoi>,
    #[serde(default)]
    address: Option<SearchAddress>,
    position: SearchPosition,
}

#[derive(Deserialize)]
struct SearchPoi {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAddress {
    #[serde(default)]
    freeform_address: Option<String>,
}

#[derive(Deserialize)]
struct SearchPosition {
    lat: f64,
    lon: f64,
}

/// Place search through TomTom `search/2/search`
pub struct TomTomSearch {
    base_url: String,
    api_key: Option<String>,
    limit: usize,
    timeout: Duration,
}

impl TomTomSearch {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            limit: 5,
            timeout: ProviderConfig::default().request_timeout,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.tomtom_base_url.clone(),
            api_key: config.tomtom_api_key.clone(),
            limit: 5,
            timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl SearchProvider for TomTomSearch {
    async fn search(&self, query: &str, country: &str) -> Result<Vec<Place>> {
        let Some(key) = &self.api_key else {
            return Ok(Vec::new());
        };

        let mut url = parse_base(&self.base_url)?;
        let file = format!("{query}.json");
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput(format!("bad search URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(["search", "2", "search", file.as_str()]);

        let limit = self.limit.to_string();
        let response = client()
            .get(url)
            .query(&[("key", key.as_str()), ("countrySet", country), ("limit", limit.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::HttpError(format!("search request failed: {status}")));
        }

        let parsed: SearchResponse = response.json().await?;
        let mut places = Vec::with_capacity(parsed.results.len());
        for hit in parsed.results {
            let Ok(position) = Coordinates::new(hit.position.lon, hit.position.lat) else {
                warn!("Dropping search hit with invalid position ({}, {})", hit.position.lon, hit.position.lat);
                continue;
            };
            let address = hit
                .address
                .and_then(|a| a.freeform_address)
                .unwrap_or_default();
            let name = match hit.poi {
                Some(poi) if !poi.name.trim().is_empty() => poi.name,
                _ => address.clone(),
            };
            places.push(Place { name, address, position });
        }
        Ok(places)
    }
}
