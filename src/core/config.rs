//! Configuration for providers and persistence

use std::env;
use std::time::Duration;

/// Endpoints and credentials for the HTTP providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of an OSRM-compatible routing server
    pub osrm_base_url: String,

    /// Base URL for TomTom traffic flow and search
    pub tomtom_base_url: String,

    /// TomTom API key; without it traffic and search report nothing
    pub tomtom_api_key: Option<String>,

    /// Base URL for WeatherAPI
    pub weather_base_url: String,

    /// WeatherAPI key; without it weather falls back to the placeholder
    pub weather_api_key: Option<String>,

    /// ISO country filter for search
    pub country: String,

    /// Per-request timeout; a timeout is a failure and is not retried
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            osrm_base_url: "https://router.project-osrm.org".to_string(),
            tomtom_base_url: "https://api.tomtom.com".to_string(),
            tomtom_api_key: None,
            weather_base_url: "https://api.weatherapi.com".to_string(),
            weather_api_key: None,
            country: "VN".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ProviderConfig {
    /// Defaults overridden by `TRIPFARE_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_var("TRIPFARE_OSRM_URL") {
            config.osrm_base_url = url;
        }
        if let Some(url) = non_empty_var("TRIPFARE_TOMTOM_URL") {
            config.tomtom_base_url = url;
        }
        if let Some(url) = non_empty_var("TRIPFARE_WEATHER_URL") {
            config.weather_base_url = url;
        }
        if let Some(country) = non_empty_var("TRIPFARE_COUNTRY") {
            config.country = country;
        }
        config.tomtom_api_key = non_empty_var("TRIPFARE_TOMTOM_KEY");
        config.weather_api_key = non_empty_var("TRIPFARE_WEATHER_KEY");
        config
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Where and how often the trip snapshot is written
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Key holding the serialized snapshot
    pub key: String,

    /// Quiet period before a requested save is written
    pub debounce: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            key: "tripfare.state".to_string(),
            debounce: Duration::from_millis(1000),
        }
    }
}
