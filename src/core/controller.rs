//! Location selection and trip state
//!
//! `TripController` is the only owner of `TripState`. Presentation layers read
//! snapshots, send `TripCommand`s and listen to `TripEvent`s; they never touch
//! the state directly.
//!
//! Every mutation that can invalidate a route takes a new request token. A
//! route computation only lands in the state if its token is still the latest
//! when it completes, so results for superseded selections are dropped.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::core::customer::CustomerInfo;
use crate::core::engine::{RouteFareEngine, RouteResult};
use crate::core::error::{Error, Result};
use crate::core::location::{Coordinates, Endpoint, Location, SelectionMode};
use crate::core::persistence::{PersistedState, StatePersistence};

const EVENT_CAPACITY: usize = 64;

/// Current trip as seen by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripState {
    pickup: Option<Location>,
    dropoff: Option<Location>,
    selection_mode: SelectionMode,
    route: Option<RouteResult>,
}

impl TripState {
    pub fn pickup(&self) -> Option<&Location> {
        self.pickup.as_ref()
    }

    pub fn dropoff(&self) -> Option<&Location> {
        self.dropoff.as_ref()
    }

    pub fn endpoint(&self, target: Endpoint) -> Option<&Location> {
        match target {
            Endpoint::Pickup => self.pickup.as_ref(),
            Endpoint::Dropoff => self.dropoff.as_ref(),
        }
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    /// Present only when both endpoints are set and the latest computation succeeded
    pub fn route(&self) -> Option<&RouteResult> {
        self.route.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.pickup.is_some() && self.dropoff.is_some()
    }

    fn set_endpoint(&mut self, target: Endpoint, location: Option<Location>) {
        match target {
            Endpoint::Pickup => self.pickup = location,
            Endpoint::Dropoff => self.dropoff = location,
        }
    }

    fn endpoints(&self) -> Option<(Location, Location)> {
        match (&self.pickup, &self.dropoff) {
            (Some(pickup), Some(dropoff)) => Some((pickup.clone(), dropoff.clone())),
            _ => None,
        }
    }
}

/// State-change notifications
#[derive(Debug, Clone, PartialEq)]
pub enum TripEvent {
    SelectionModeChanged(SelectionMode),
    LocationCommitted { target: Endpoint, location: Location },
    LocationCleared(Endpoint),
    RouteRequested { token: u64 },
    RouteUpdated(RouteResult),
    RouteFailed { message: String },
    /// A computation finished after its selection was superseded
    RouteDiscarded { token: u64 },
    TripCleared,
    CustomerUpdated,
    SessionRestored,
}

/// Operations the presentation layer may invoke
#[derive(Debug, Clone, PartialEq)]
pub enum TripCommand {
    EnterSelection(Endpoint),
    CancelSelection,
    Commit {
        target: Endpoint,
        longitude: f64,
        latitude: f64,
        name: Option<String>,
    },
    Clear(Endpoint),
    ClearAll,
    Recompute,
    SetCustomer(CustomerInfo),
}

/// What a state change led to
#[derive(Debug)]
pub enum Outcome {
    /// State updated; no route computation was triggered
    Updated,
    /// Route computed and stored
    Routed(RouteResult),
    /// Route computation failed; endpoints kept, route absent, retry with `recompute`
    RouteFailed(Error),
    /// Computation finished but a newer change had replaced its selection
    Superseded,
}

impl Outcome {
    pub fn route(&self) -> Option<&RouteResult> {
        match self {
            Outcome::Routed(route) => Some(route),
            _ => None,
        }
    }
}

/// A trip ready to be dispatched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripConfirmation {
    pub pickup: Location,
    pub dropoff: Location,
    pub customer: CustomerInfo,
    pub route: RouteResult,
}

/// Owner of the trip state for one session
pub struct TripController {
    engine: RouteFareEngine,
    persistence: Option<StatePersistence>,
    state: Mutex<TripState>,
    customer: Mutex<CustomerInfo>,
    latest_token: AtomicU64,
    restored: AtomicBool,
    events: broadcast::Sender<TripEvent>,
}

impl TripController {
    /// Controller without persistence
    pub fn new(engine: RouteFareEngine) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine,
            persistence: None,
            state: Mutex::new(TripState::default()),
            customer: Mutex::new(CustomerInfo::default()),
            latest_token: AtomicU64::new(0),
            restored: AtomicBool::new(false),
            events,
        }
    }

    pub fn with_persistence(mut self, persistence: StatePersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn engine(&self) -> &RouteFareEngine {
        &self.engine
    }

    pub fn persistence(&self) -> Option<&StatePersistence> {
        self.persistence.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current trip
    pub fn state(&self) -> TripState {
        self.lock_state().clone()
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.lock_state().selection_mode
    }

    pub fn customer(&self) -> CustomerInfo {
        self.lock_customer().clone()
    }

    /// Start choosing `target`; switching target mid-selection is allowed
    pub fn enter_selection_mode(&self, target: Endpoint) {
        self.set_selection_mode(target.selecting());
    }

    /// Stop choosing without touching committed endpoints
    pub fn cancel_selection(&self) {
        self.set_selection_mode(SelectionMode::Idle);
    }

    fn set_selection_mode(&self, mode: SelectionMode) {
        let changed = {
            let mut state = self.lock_state();
            let changed = state.selection_mode != mode;
            state.selection_mode = mode;
            changed
        };
        if changed {
            self.emit(TripEvent::SelectionModeChanged(mode));
        }
    }

    /// Commit raw coordinates as `target`
    ///
    /// Out-of-range coordinates fail with `InvalidCoordinate` before anything changes.
    pub async fn commit_location(
        &self,
        target: Endpoint,
        longitude: f64,
        latitude: f64,
        name: Option<String>,
    ) -> Result<Outcome> {
        let coordinates = Coordinates::new(longitude, latitude)?;
        Ok(self.commit(target, Location::new(coordinates, name)).await)
    }

    /// Commit a location as `target`
    ///
    /// The explicit target wins over the selection mode. Leaves selection mode
    /// if it was choosing this target. Routes once when the other endpoint is
    /// already set, and always schedules a save.
    pub async fn commit(&self, target: Endpoint, location: Location) -> Outcome {
        let (token, endpoints, left_selection) = {
            let mut state = self.lock_state();
            state.set_endpoint(target, Some(location.clone()));
            state.route = None;

            let left_selection = state.selection_mode == target.selecting();
            if left_selection {
                state.selection_mode = SelectionMode::Idle;
            }
            (self.next_token(), state.endpoints(), left_selection)
        };

        info!("Committed {target}: {}", location.label());
        self.emit(TripEvent::LocationCommitted { target, location });
        if left_selection {
            self.emit(TripEvent::SelectionModeChanged(SelectionMode::Idle));
        }
        self.schedule_save();

        match endpoints {
            Some((pickup, dropoff)) => self.run_route(token, pickup, dropoff).await,
            None => Outcome::Updated,
        }
    }

    /// Remove one endpoint; a no-op when it is already absent
    pub fn clear_location(&self, target: Endpoint) {
        {
            let mut state = self.lock_state();
            if state.endpoint(target).is_none() {
                return;
            }
            state.set_endpoint(target, None);
            state.route = None;
            self.next_token();
        }

        info!("Cleared {target}");
        self.emit(TripEvent::LocationCleared(target));
        self.schedule_save();
    }

    /// Drop both endpoints and the route, back to idle
    pub fn clear_all(&self) {
        {
            let mut state = self.lock_state();
            *state = TripState::default();
            self.next_token();
        }

        info!("Cleared trip");
        self.emit(TripEvent::TripCleared);
        self.schedule_save();
    }

    /// Compute the route again for the current endpoints
    pub async fn recompute(&self) -> Outcome {
        let (token, endpoints) = {
            let state = self.lock_state();
            (self.next_token(), state.endpoints())
        };
        match endpoints {
            Some((pickup, dropoff)) => self.run_route(token, pickup, dropoff).await,
            None => Outcome::Updated,
        }
    }

    pub fn set_customer(&self, customer: CustomerInfo) {
        *self.lock_customer() = customer;
        self.emit(TripEvent::CustomerUpdated);
        self.schedule_save();
    }

    /// Validate the customer and hand back the trip for dispatch
    ///
    /// Does not change the trip state.
    pub fn confirm(&self) -> Result<TripConfirmation> {
        let customer = self.customer();
        customer.validate()?;

        let state = self.state();
        let (Some(pickup), Some(dropoff)) = (state.pickup, state.dropoff) else {
            return Err(Error::InvalidInput("both pickup and dropoff are required".to_string()));
        };
        let Some(route) = state.route else {
            return Err(Error::RouteUnavailable("no route computed for this trip".to_string()));
        };

        Ok(TripConfirmation {
            pickup,
            dropoff,
            customer,
            route,
        })
    }

    /// Apply the persisted snapshot, at most once per controller
    ///
    /// Recomputes the route when both endpoints come back, but does not
    /// schedule a save. Returns whether a snapshot was applied.
    pub async fn restore(&self) -> bool {
        if self.restored.swap(true, Ordering::SeqCst) {
            debug!("Session already restored");
            return false;
        }
        let Some(snapshot) = self.persistence.as_ref().and_then(|p| p.restore()) else {
            return false;
        };

        let pickup = snapshot.pickup_location().ok().flatten();
        let dropoff = snapshot.dropoff_location().ok().flatten();
        *self.lock_customer() = snapshot.customer;

        let (token, endpoints) = {
            let mut state = self.lock_state();
            state.pickup = pickup;
            state.dropoff = dropoff;
            state.route = None;
            (self.next_token(), state.endpoints())
        };

        info!("Restored trip session");
        self.emit(TripEvent::SessionRestored);
        if let Some((pickup, dropoff)) = endpoints {
            self.run_route(token, pickup, dropoff).await;
        }
        true
    }

    /// Run one presentation-layer command
    pub async fn dispatch(&self, command: TripCommand) -> Result<Outcome> {
        match command {
            TripCommand::EnterSelection(target) => self.enter_selection_mode(target),
            TripCommand::CancelSelection => self.cancel_selection(),
            TripCommand::Commit {
                target,
                longitude,
                latitude,
                name,
            } => return self.commit_location(target, longitude, latitude, name).await,
            TripCommand::Clear(target) => self.clear_location(target),
            TripCommand::ClearAll => self.clear_all(),
            TripCommand::Recompute => return Ok(self.recompute().await),
            TripCommand::SetCustomer(customer) => self.set_customer(customer),
        }
        Ok(Outcome::Updated)
    }

    async fn run_route(&self, token: u64, pickup: Location, dropoff: Location) -> Outcome {
        self.emit(TripEvent::RouteRequested { token });
        let result = self.engine.compute(&pickup, &dropoff).await;

        let outcome = {
            let mut state = self.lock_state();
            if self.latest_token.load(Ordering::SeqCst) != token {
                None
            } else {
                match result {
                    Ok(route) => {
                        state.route = Some(route.clone());
                        Some(Ok(route))
                    }
                    Err(e) => {
                        state.route = None;
                        Some(Err(e))
                    }
                }
            }
        };

        match outcome {
            None => {
                debug!("Discarding route for superseded request {token}");
                self.emit(TripEvent::RouteDiscarded { token });
                Outcome::Superseded
            }
            Some(Ok(route)) => {
                self.emit(TripEvent::RouteUpdated(route.clone()));
                Outcome::Routed(route)
            }
            Some(Err(e)) => {
                warn!("⚠️  Route computation failed: {e}");
                self.emit(TripEvent::RouteFailed { message: e.to_string() });
                Outcome::RouteFailed(e)
            }
        }
    }

    // Called with the state lock held so tokens follow mutation order
    fn next_token(&self) -> u64 {
        self.latest_token.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn schedule_save(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = {
            let state = self.lock_state();
            let customer = self.lock_customer();
            PersistedState::now(state.pickup.as_ref(), state.dropoff.as_ref(), customer.clone())
        };
        persistence.save(snapshot);
    }

    fn emit(&self, event: TripEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, TripState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_customer(&self) -> MutexGuard<'_, CustomerInfo> {
        self.customer.lock().unwrap_or_else(|e| e.into_inner())
    }
}
