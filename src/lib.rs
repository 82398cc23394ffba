//! # Tripfare Library
//!
//! Trip-planning state and fare engine: pick a pickup and a dropoff, get a
//! route, and see a priced breakdown with time-of-day and condition-based
//! surcharges. Selections survive restarts through a debounced snapshot.
//!
//! ## Features
//!
//! - **Selection state machine**: explicit pickup/dropoff commits, advisory selection mode
//! - **Deterministic pricing**: base, distance and time fares, surcharges and VAT
//! - **Per-step congestion**: current vs. free-flow speed, degrading to unknown
//! - **Stale result protection**: only the latest selection's route is kept
//! - **Debounced persistence**: bursts of changes cost a single write
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use tripfare::Coordinates;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pickup = Coordinates::new(106.7009, 10.7769)?;
//!     let dropoff = Coordinates::new(106.6602, 10.7626)?;
//!
//!     let route = tripfare::quote(pickup, dropoff).await?;
//!     println!("Total: {}", tripfare::format_amount(route.fare.total));
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive Sessions
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tripfare::{Endpoint, FileStore, ProviderConfig, RouteFareEngine, StatePersistence, TripController};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = RouteFareEngine::from_config(&ProviderConfig::from_env());
//! let persistence = StatePersistence::new(Arc::new(FileStore::new("./state")));
//! let controller = TripController::new(engine).with_persistence(persistence);
//!
//! controller.restore().await;
//! controller.enter_selection_mode(Endpoint::Pickup);
//! controller.commit_location(Endpoint::Pickup, 106.7009, 10.7769, None).await?;
//! let outcome = controller.commit_location(Endpoint::Dropoff, 106.6602, 10.7626, None).await?;
//! if let Some(route) = outcome.route() {
//!     println!("{:.1} km", route.distance_km());
//! }
//! # Ok(())
//! # }
//! ```

// Internal modules
mod core;

pub use crate::core::config::{PersistenceConfig, ProviderConfig};
pub use crate::core::congestion::{classify, CongestionLevel, CongestionSample};
pub use crate::core::controller::{Outcome, TripCommand, TripConfirmation, TripController, TripEvent, TripState};
pub use crate::core::customer::CustomerInfo;
pub use crate::core::engine::{
    Clock, FixedClock, FixedSurcharge, NoSurcharge, RouteFareEngine, RouteResult, RouteStep,
    SurchargePolicy, SystemClock,
};
pub use crate::core::error::{Error, Result, ValidationIssue};
pub use crate::core::fare::{
    compute_fare, format_amount, round_amount, rush_hour_factor, FareBreakdown, FareRates,
    SurchargeFactors,
};
pub use crate::core::http::{describe_maneuver, OsrmRouter, TomTomSearch, TomTomTraffic, WeatherApi};
pub use crate::core::location::{Coordinates, Endpoint, Location, SelectionMode};
pub use crate::core::persistence::{
    FileStore, KeyValueStore, MemoryStore, PersistedLocation, PersistedState, StatePersistence,
    SNAPSHOT_VERSION,
};
pub use crate::core::provider::{
    NoTraffic, NoWeather, Place, ProviderRoute, ProviderStep, RoutingProvider, SearchProvider,
    TrafficFlow, TrafficProvider, WeatherProvider, WeatherReport,
};
pub use crate::core::search::{rank_places, SearchService};

/// Route and price a trip with the default providers
///
/// Uses `ProviderConfig::from_env()`, the local clock and no condition surcharges.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pickup = tripfare::Coordinates::new(106.7009, 10.7769)?;
/// let dropoff = tripfare::Coordinates::new(106.6602, 10.7626)?;
/// let route = tripfare::quote(pickup, dropoff).await?;
/// println!("{} steps", route.steps.len());
/// # Ok(())
/// # }
/// ```
pub async fn quote(pickup: Coordinates, dropoff: Coordinates) -> Result<RouteResult> {
    let engine = RouteFareEngine::from_config(&ProviderConfig::from_env());
    engine
        .compute(&Location::new(pickup, None), &Location::new(dropoff, None))
        .await
}
