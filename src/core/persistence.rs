//! Trip state persistence
//!
//! Snapshots are written to a key-value store after a quiet period, so a burst
//! of saves costs one write. Restoring never fails: missing or unreadable
//! snapshots simply mean an empty trip.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::config::PersistenceConfig;
use crate::core::customer::CustomerInfo;
use crate::core::error::{Error, Result};
use crate::core::location::{Coordinates, Location};

/// Snapshot format written by this version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable string storage keyed by name
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::IoError(e)),
        }
    }

    // Write-then-rename so a crash never leaves a half-written snapshot
    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::IoError(e));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::IoError(e)),
        }
    }
}

/// Location as stored: `{"coords": [lng, lat], "name": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedLocation {
    pub coords: [f64; 2],
    #[serde(default)]
    pub name: Option<String>,
}

impl From<&Location> for PersistedLocation {
    fn from(location: &Location) -> Self {
        Self {
            coords: location.coordinates().to_lng_lat(),
            name: location.name().map(str::to_string),
        }
    }
}

impl PersistedLocation {
    fn to_location(&self) -> Result<Location> {
        let coordinates = Coordinates::from_lng_lat(self.coords)?;
        Ok(Location::new(coordinates, self.name.clone()))
    }
}

fn legacy_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Serialized trip snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Missing in snapshots written before versioning; read as version 1
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(rename = "pickupLocation", default)]
    pub pickup: Option<PersistedLocation>,
    #[serde(rename = "dropoffLocation", default)]
    pub dropoff: Option<PersistedLocation>,
    #[serde(default)]
    pub customer: CustomerInfo,
    /// Milliseconds since the Unix epoch at save time
    #[serde(default)]
    pub timestamp: i64,
}

impl PersistedState {
    pub fn new(
        pickup: Option<&Location>,
        dropoff: Option<&Location>,
        customer: CustomerInfo,
        timestamp: i64,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            pickup: pickup.map(PersistedLocation::from),
            dropoff: dropoff.map(PersistedLocation::from),
            customer,
            timestamp,
        }
    }

    /// Snapshot stamped with the current time
    pub fn now(pickup: Option<&Location>, dropoff: Option<&Location>, customer: CustomerInfo) -> Self {
        Self::new(pickup, dropoff, customer, chrono::Utc::now().timestamp_millis())
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidInput(format!("cannot encode snapshot: {e}")))
    }

    /// Decode and check a stored snapshot
    ///
    /// Unknown future versions and out-of-range coordinates are `PersistenceCorrupt`.
    pub fn decode(raw: &str) -> Result<Self> {
        let state: PersistedState =
            serde_json::from_str(raw).map_err(|e| Error::PersistenceCorrupt(e.to_string()))?;
        if state.version > SNAPSHOT_VERSION {
            return Err(Error::PersistenceCorrupt(format!(
                "unsupported snapshot version {}",
                state.version
            )));
        }
        state.pickup_location()?;
        state.dropoff_location()?;
        Ok(state)
    }

    pub fn pickup_location(&self) -> Result<Option<Location>> {
        decode_location(self.pickup.as_ref())
    }

    pub fn dropoff_location(&self) -> Result<Option<Location>> {
        decode_location(self.dropoff.as_ref())
    }
}

fn decode_location(stored: Option<&PersistedLocation>) -> Result<Option<Location>> {
    stored
        .map(|loc| {
            loc.to_location()
                .map_err(|e| Error::PersistenceCorrupt(e.to_string()))
        })
        .transpose()
}

/// Snapshot waiting for its quiet period, tagged with the save that queued it
type Pending = Mutex<Option<(u64, PersistedState)>>;

/// Debounced writer and reader of trip snapshots
pub struct StatePersistence {
    store: Arc<dyn KeyValueStore>,
    key: String,
    debounce: Duration,
    pending: Arc<Pending>,
    generation: Arc<AtomicU64>,
}

impl StatePersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, PersistenceConfig::default())
    }

    pub fn with_config(store: Arc<dyn KeyValueStore>, config: PersistenceConfig) -> Self {
        Self {
            store,
            key: config.key,
            debounce: config.debounce,
            pending: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Request a save
    ///
    /// Only the latest state is written, once `debounce` passes with no newer
    /// request. Outside a tokio runtime the write happens immediately.
    pub fn save(&self, state: PersistedState) {
        let generation = {
            let mut pending = lock(&self.pending);
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *pending = Some((generation, state));
            generation
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.write_pending();
            return;
        };

        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let debounce = self.debounce;
        let pending = Arc::clone(&self.pending);
        handle.spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(state) = take_if_current(&pending, generation) {
                write_snapshot(store.as_ref(), &key, &state);
            }
        });
    }

    /// Write any pending snapshot now and cancel its timer
    ///
    /// Returns whether something was written.
    pub fn flush(&self) -> bool {
        self.write_pending()
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    fn write_pending(&self) -> bool {
        let state = lock(&self.pending).take();
        match state {
            Some((_, state)) => write_snapshot(self.store.as_ref(), &self.key, &state),
            None => false,
        }
    }

    /// Last durable snapshot, or `None` when missing or unreadable
    ///
    /// An unreadable snapshot is removed from the store so it is not reported again.
    pub fn restore(&self) -> Option<PersistedState> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("⚠️  Could not read trip snapshot '{}': {e}", self.key);
                return None;
            }
        };

        match PersistedState::decode(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("⚠️  Discarding trip snapshot '{}': {e}", self.key);
                if let Err(e) = self.store.remove(&self.key) {
                    warn!("⚠️  Could not remove trip snapshot '{}': {e}", self.key);
                }
                None
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Take the pending snapshot only if no newer save has replaced it
fn take_if_current(pending: &Pending, generation: u64) -> Option<PersistedState> {
    let mut pending = lock(pending);
    match pending.as_ref() {
        Some((queued, _)) if *queued == generation => pending.take().map(|(_, state)| state),
        _ => None,
    }
}

fn write_snapshot(store: &dyn KeyValueStore, key: &str, state: &PersistedState) -> bool {
    let written = state.encode().and_then(|raw| store.set(key, &raw));
    match written {
        Ok(()) => {
            debug!("Saved trip snapshot '{key}'");
            true
        }
        Err(e) => {
            warn!("⚠️  Failed to save trip snapshot '{key}': {e}");
            false
        }
    }
}
