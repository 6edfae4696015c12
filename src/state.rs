// Application state shared by the fleet sync, the marker controllers and the HTTP handlers.
// Readers take a snapshot at the start of an operation; no lock is held across an await.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::client::ForecastSource;
use crate::error::MarkerError;
use crate::fleet::FleetColorSync;
use crate::marker::{MarkerController, MarkerEntity};
use crate::models::{Station, StationId};
use crate::time::{Clock, TimeNormalizer};

#[derive(Debug, Clone)]
pub struct SelectedInstant {
    inner: Arc<RwLock<DateTime<Utc>>>,
}

impl SelectedInstant {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(at)),
        }
    }

    pub fn get(&self) -> DateTime<Utc> {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the previous value.
    fn set(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchText {
    inner: Arc<RwLock<String>>,
}

impl SearchText {
    pub fn get(&self) -> String {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, text: &str) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = text.to_string();
    }
}

/// One marker per station id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct MarkerRegistry {
    inner: Arc<Mutex<BTreeMap<StationId, MarkerEntity>>>,
}

impl MarkerRegistry {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<StationId, MarkerEntity>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, station: Station) -> Result<(), MarkerError> {
        let mut markers = self.lock();
        if markers.contains_key(&station.id) {
            return Err(MarkerError::DuplicateMarker(station.id));
        }
        markers.insert(station.id, MarkerEntity::new(station));
        Ok(())
    }

    /// Drops every marker and rebuilds from `stations`. Repeated ids in the
    /// listing keep their first occurrence.
    pub fn replace_all(&self, stations: Vec<Station>) -> usize {
        let mut markers = self.lock();
        markers.clear();
        for station in stations {
            if markers.contains_key(&station.id) {
                log::warn!("⚠️  Station {} listed twice, keeping the first entry", station.id);
                continue;
            }
            markers.insert(station.id, MarkerEntity::new(station));
        }
        markers.len()
    }

    pub fn get(&self, id: StationId) -> Option<MarkerEntity> {
        self.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: StationId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn ids(&self) -> Vec<StationId> {
        self.lock().keys().copied().collect()
    }

    pub fn snapshot(&self) -> Vec<MarkerEntity> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn update<R>(
        &self,
        id: StationId,
        f: impl FnOnce(&mut MarkerEntity) -> R,
    ) -> Result<R, MarkerError> {
        let mut markers = self.lock();
        let marker = markers.get_mut(&id).ok_or(MarkerError::UnknownMarker(id))?;
        Ok(f(marker))
    }

    pub fn invalidate_predictions(&self) {
        for marker in self.lock().values_mut() {
            marker.invalidate_prediction();
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub selected: SelectedInstant,
    pub markers: MarkerRegistry,
    pub search: SearchText,
    pub source: Arc<dyn ForecastSource>,
    pub clock: Arc<dyn Clock>,
    pub normalizer: TimeNormalizer,
}

impl AppState {
    /// The selected instant starts at the clock's "now".
    pub fn new(source: Arc<dyn ForecastSource>, clock: Arc<dyn Clock>, normalizer: TimeNormalizer) -> Self {
        let now = clock.now();
        Self {
            selected: SelectedInstant::new(now),
            markers: MarkerRegistry::default(),
            search: SearchText::default(),
            source,
            clock,
            normalizer,
        }
    }

    /// The only write path for the selected instant. Cached predictions are
    /// dropped whenever the value changes.
    pub fn select_instant(&self, at: DateTime<Utc>) -> bool {
        let previous = self.selected.set(at);
        if previous == at {
            return false;
        }
        self.markers.invalidate_predictions();
        log::info!("🕒 Selected instant changed: {} -> {}", previous, at);
        true
    }

    pub fn controller(&self, id: StationId) -> Result<MarkerController, MarkerError> {
        MarkerController::new(self.clone(), id)
    }

    pub fn fleet_sync(&self) -> FleetColorSync {
        FleetColorSync::new(self.clone())
    }

    pub async fn reload_stations(&self) -> usize {
        let stations = self.source.stations().await;
        let count = self.markers.replace_all(stations);
        log::info!("📍 Loaded {} station markers", count);
        count
    }

    /// Stores the search text and returns the matching stations; a blank query lists every station.
    pub async fn search(&self, query: &str) -> Vec<Station> {
        self.search.set(query);
        let query = query.trim();
        if query.is_empty() {
            return self.markers.snapshot().iter().map(|m| m.station).collect();
        }
        self.source.search_stations(query).await
    }
}
