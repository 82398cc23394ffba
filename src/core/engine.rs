//! Route and fare computation
//!
//! Turns a routing-provider answer into a priced `RouteResult`, classifying
//! congestion for every step along the way.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::config::ProviderConfig;
use crate::core::congestion::CongestionSample;
use crate::core::error::{Error, Result};
use crate::core::fare::{FareBreakdown, FareRates, SurchargeFactors};
use crate::core::http::{OsrmRouter, TomTomTraffic, WeatherApi};
use crate::core::location::{Coordinates, Location};
use crate::core::provider::{
    NoTraffic, NoWeather, ProviderStep, RoutingProvider, TrafficProvider, WeatherProvider,
    WeatherReport,
};

/// Source of local wall-clock time for pricing
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local time of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Always the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Decides the weather and traffic surcharge factors for a trip
#[async_trait]
pub trait SurchargePolicy: Send + Sync {
    async fn factors(&self, pickup: &Location, steps: &[RouteStep]) -> SurchargeFactors;
}

/// No condition-based surcharge
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSurcharge;

#[async_trait]
impl SurchargePolicy for NoSurcharge {
    async fn factors(&self, _pickup: &Location, _steps: &[RouteStep]) -> SurchargeFactors {
        SurchargeFactors::default()
    }
}

/// Constant factors regardless of conditions
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSurcharge {
    pub weather: f64,
    pub traffic: f64,
}

#[async_trait]
impl SurchargePolicy for FixedSurcharge {
    async fn factors(&self, _pickup: &Location, _steps: &[RouteStep]) -> SurchargeFactors {
        SurchargeFactors::new(self.weather, self.traffic).sanitized()
    }
}

/// One step of a priced route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub instruction: String,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub maneuver_type: String,
    pub congestion: CongestionSample,
}

/// A computed route with its fare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub total_distance_meters: f64,
    pub total_duration_seconds: f64,
    /// Provider order, never reordered
    pub steps: Vec<RouteStep>,
    pub fare: FareBreakdown,
    /// Full route line for map display
    pub geometry: Vec<Coordinates>,
}

impl RouteResult {
    pub fn distance_km(&self) -> f64 {
        self.total_distance_meters / 1000.0
    }

    pub fn duration_min(&self) -> f64 {
        self.total_duration_seconds / 60.0
    }
}

/// Orchestrates routing, traffic lookups and pricing
pub struct RouteFareEngine {
    router: Arc<dyn RoutingProvider>,
    traffic: Arc<dyn TrafficProvider>,
    weather: Arc<dyn WeatherProvider>,
    surcharges: Arc<dyn SurchargePolicy>,
    clock: Arc<dyn Clock>,
    rates: FareRates,
}

impl RouteFareEngine {
    /// Engine with no traffic, no weather, no surcharges and the system clock
    pub fn new(router: impl RoutingProvider + 'static) -> Self {
        Self {
            router: Arc::new(router),
            traffic: Arc::new(NoTraffic),
            weather: Arc::new(NoWeather),
            surcharges: Arc::new(NoSurcharge),
            clock: Arc::new(SystemClock),
            rates: FareRates::default(),
        }
    }

    /// Engine backed by the HTTP providers
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(OsrmRouter::from_config(config))
            .with_traffic(TomTomTraffic::from_config(config))
            .with_weather(WeatherApi::from_config(config))
    }

    pub fn with_traffic(mut self, traffic: impl TrafficProvider + 'static) -> Self {
        self.traffic = Arc::new(traffic);
        self
    }

    pub fn with_weather(mut self, weather: impl WeatherProvider + 'static) -> Self {
        self.weather = Arc::new(weather);
        self
    }

    pub fn with_surcharges(mut self, policy: impl SurchargePolicy + 'static) -> Self {
        self.surcharges = Arc::new(policy);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_rates(mut self, rates: FareRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn rates(&self) -> &FareRates {
        &self.rates
    }

    /// Route and price a trip
    ///
    /// Fails with `RouteUnavailable` when the routing provider errors or has no
    /// route. Traffic failures only degrade steps to unknown congestion.
    pub async fn compute(&self, pickup: &Location, dropoff: &Location) -> Result<RouteResult> {
        let route = match self.router.route(pickup.coordinates(), dropoff.coordinates()).await {
            Ok(Some(route)) => route,
            Ok(None) => {
                return Err(Error::RouteUnavailable(format!(
                    "no route from {} to {}",
                    pickup.label(),
                    dropoff.label()
                )))
            }
            Err(e) => return Err(Error::RouteUnavailable(e.to_string())),
        };
        route
            .validate()
            .map_err(|e| Error::RouteUnavailable(e.to_string()))?;

        let steps = join_all(route.steps.iter().map(|step| self.price_step(step))).await;

        let distance_km = route.distance_meters / 1000.0;
        let duration_min = route.duration_seconds / 60.0;
        let factors = self.surcharges.factors(pickup, &steps).await;
        let fare = self
            .rates
            .compute(distance_km, duration_min, self.clock.now(), factors);

        debug!(
            "Priced route {:.2} km / {:.1} min with {} steps: total {:.0}",
            distance_km,
            duration_min,
            steps.len(),
            fare.total
        );

        Ok(RouteResult {
            total_distance_meters: route.distance_meters,
            total_duration_seconds: route.duration_seconds,
            steps,
            fare,
            geometry: route.geometry,
        })
    }

    async fn price_step(&self, step: &ProviderStep) -> RouteStep {
        RouteStep {
            instruction: step.instruction.clone(),
            distance_meters: step.distance_meters,
            duration_seconds: step.duration_seconds,
            maneuver_type: step.maneuver_type.clone(),
            congestion: self.sample_congestion(step).await,
        }
    }

    // Keyed by the step's first coordinate; any failure means unknown
    async fn sample_congestion(&self, step: &ProviderStep) -> CongestionSample {
        let Some(first) = step.geometry.first() else {
            return CongestionSample::unknown();
        };
        match self.traffic.flow(*first).await {
            Ok(Some(flow)) => CongestionSample::from_speeds(flow.current_speed_kmh, flow.free_flow_speed_kmh),
            Ok(None) => CongestionSample::unknown(),
            Err(e) => {
                warn!("⚠️  Traffic lookup failed at {first}: {e}");
                CongestionSample::unknown()
            }
        }
    }

    /// Current weather at a location, or the placeholder when the provider fails
    pub async fn weather_at(&self, location: &Location) -> WeatherReport {
        match self.weather.current(location.coordinates()).await {
            Ok(report) => report,
            Err(e) => {
                warn!("⚠️  Weather lookup failed at {}: {e}", location.label());
                WeatherReport::placeholder()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::congestion::CongestionLevel;
    use crate::core::provider::{ProviderRoute, TrafficFlow};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn off_peak() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    pub(crate) fn point(lng: f64, lat: f64) -> Coordinates {
        Coordinates::new(lng, lat).unwrap()
    }

    pub(crate) fn place(lng: f64, lat: f64) -> Location {
        Location::new(point(lng, lat), None)
    }

    /// 10 km, 20 min, three steps
    pub(crate) fn ten_km_route() -> ProviderRoute {
        let step = |i: usize, lng: f64| ProviderStep {
            distance_meters: 10_000.0 / 3.0,
            duration_seconds: 400.0,
            maneuver_type: if i == 0 { "depart".to_string() } else { "turn".to_string() },
            instruction: format!("step {i}"),
            geometry: vec![point(lng, 10.0)],
        };
        ProviderRoute {
            distance_meters: 10_000.0,
            duration_seconds: 1_200.0,
            geometry: vec![point(106.0, 10.0), point(106.2, 10.0)],
            steps: vec![step(0, 106.0), step(1, 106.1), step(2, 106.2)],
        }
    }

    /// Router returning a fixed answer and counting calls
    pub(crate) struct CannedRouter {
        pub answer: Option<ProviderRoute>,
        pub calls: Arc<AtomicUsize>,
    }

    impl CannedRouter {
        pub(crate) fn new(answer: Option<ProviderRoute>) -> Self {
            Self {
                answer,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl RoutingProvider for CannedRouter {
        async fn route(&self, _origin: Coordinates, _destination: Coordinates) -> Result<Option<ProviderRoute>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct FailingRouter;

    #[async_trait]
    impl RoutingProvider for FailingRouter {
        async fn route(&self, _origin: Coordinates, _destination: Coordinates) -> Result<Option<ProviderRoute>> {
            Err(Error::ProviderUnreachable("connection refused".to_string()))
        }
    }

    /// Heavy traffic at lng 106.0, provider error at 106.1, nothing elsewhere
    struct PatchyTraffic;

    #[async_trait]
    impl TrafficProvider for PatchyTraffic {
        async fn flow(&self, at: Coordinates) -> Result<Option<TrafficFlow>> {
            if at.longitude() == 106.0 {
                Ok(Some(TrafficFlow {
                    current_speed_kmh: Some(12.0),
                    free_flow_speed_kmh: Some(40.0),
                }))
            } else if at.longitude() == 106.1 {
                Err(Error::ProviderUnreachable("timeout".to_string()))
            } else {
                Ok(None)
            }
        }
    }

    struct BrokenWeather;

    #[async_trait]
    impl WeatherProvider for BrokenWeather {
        async fn current(&self, _at: Coordinates) -> Result<WeatherReport> {
            Err(Error::ProviderUnreachable("down".to_string()))
        }
    }

    fn engine(router: impl RoutingProvider + 'static) -> RouteFareEngine {
        RouteFareEngine::new(router).with_clock(FixedClock(off_peak()))
    }

    #[tokio::test]
    async fn test_compute_prices_ten_km_trip() {
        let engine = engine(CannedRouter::new(Some(ten_km_route())));
        let result = engine.compute(&place(106.0, 10.0), &place(106.2, 10.0)).await.unwrap();

        assert_eq!(result.distance_km(), 10.0);
        assert_eq!(result.duration_min(), 20.0);
        assert!((result.fare.subtotal - 145_000.0).abs() < 1e-6);
        assert!((result.fare.total - 159_500.0).abs() < 1e-6);
        assert_eq!(result.geometry.len(), 2);
    }

    #[tokio::test]
    async fn test_steps_keep_order_and_degrade_softly() {
        let engine = engine(CannedRouter::new(Some(ten_km_route()))).with_traffic(PatchyTraffic);
        let result = engine.compute(&place(106.0, 10.0), &place(106.2, 10.0)).await.unwrap();

        let instructions: Vec<_> = result.steps.iter().map(|s| s.instruction.as_str()).collect();
        assert_eq!(instructions, ["step 0", "step 1", "step 2"]);

        assert_eq!(result.steps[0].congestion.level, CongestionLevel::Heavy);
        assert_eq!(result.steps[0].congestion.current_speed_kmh, Some(12.0));
        assert_eq!(result.steps[1].congestion.level, CongestionLevel::Unknown);
        assert_eq!(result.steps[2].congestion.level, CongestionLevel::Unknown);
    }

    #[tokio::test]
    async fn test_step_without_geometry_is_unknown() {
        let mut route = ten_km_route();
        route.steps[0].geometry.clear();
        let engine = engine(CannedRouter::new(Some(route))).with_traffic(PatchyTraffic);
        let result = engine.compute(&place(106.0, 10.0), &place(106.2, 10.0)).await.unwrap();
        assert_eq!(result.steps[0].congestion.level, CongestionLevel::Unknown);
    }

    #[tokio::test]
    async fn test_route_unavailable_on_no_route_or_error() {
        let none = engine(CannedRouter::new(None));
        assert!(matches!(
            none.compute(&place(0.0, 0.0), &place(1.0, 1.0)).await,
            Err(Error::RouteUnavailable(_))
        ));

        let failing = engine(FailingRouter);
        match failing.compute(&place(0.0, 0.0), &place(1.0, 1.0)).await {
            Err(Error::RouteUnavailable(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("Expected RouteUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fixed_surcharge_applied() {
        let engine = engine(CannedRouter::new(Some(ten_km_route()))).with_surcharges(FixedSurcharge {
            weather: 0.1,
            traffic: 0.05,
        });
        let result = engine.compute(&place(106.0, 10.0), &place(106.2, 10.0)).await.unwrap();

        assert!((result.fare.weather_surcharge - 14_500.0).abs() < 1e-6);
        assert!((result.fare.traffic_surcharge - 7_250.0).abs() < 1e-6);
        assert!((result.fare.total - 145_000.0 * 1.15 * 1.10).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_weather_falls_back_to_placeholder() {
        let engine = engine(CannedRouter::new(None)).with_weather(BrokenWeather);
        let report = engine.weather_at(&place(106.7, 10.77)).await;
        assert!(report.is_placeholder());
    }
}
