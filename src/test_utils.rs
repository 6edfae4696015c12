// Shared helpers for unit and service tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{ForecastSource, Result};
use crate::error::ForecastError;
use crate::models::{Prediction, PredictionPayload, Station, StationDetails, StationId, WeatherForecast};
use crate::state::AppState;
use crate::time::{FixedClock, NormalizedInstant, TimeNormalizer};

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn station(id: StationId) -> Station {
    Station {
        id,
        latitude: 45.75 + f64::from(id) / 1000.0,
        longitude: 4.85,
    }
}

pub fn details(id: StationId, name: &str, capacity: u32) -> StationDetails {
    StationDetails {
        id,
        name: name.to_string(),
        latitude: 45.75,
        longitude: 4.85,
        address: format!("{} rue de la République", id),
        area: "Lyon 2e".to_string(),
        capacity,
    }
}

/// State over `source` with the clock frozen at `now` (Paris time rendering).
pub fn app_state(source: Arc<dyn ForecastSource>, now: DateTime<Utc>) -> AppState {
    AppState::new(source, Arc::new(FixedClock(now)), TimeNormalizer::default())
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// In-memory backend that records every call.
#[derive(Default)]
pub struct FakeSource {
    details: HashMap<StationId, StationDetails>,
    predictions: HashMap<StationId, PredictionPayload>,
    stations: Vec<Station>,
    failing: bool,
    predictions_failing: bool,
    details_failures: AtomicUsize,
    prediction_hook: Mutex<Option<Hook>>,
    dates: Mutex<Vec<String>>,
    pub details_calls: AtomicUsize,
    pub prediction_calls: AtomicUsize,
    pub all_predictions_calls: AtomicUsize,
    pub all_details_calls: AtomicUsize,
    pub stations_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_details(mut self, details: StationDetails) -> Self {
        self.details.insert(details.id, details);
        self
    }

    pub fn with_prediction(mut self, id: StationId, available_bikes: u32, free_stands: u32) -> Self {
        self.predictions.insert(
            id,
            PredictionPayload {
                id,
                free_stands,
                available_bikes,
            },
        );
        self
    }

    pub fn with_stations(mut self, stations: Vec<Station>) -> Self {
        self.stations = stations;
        self
    }

    /// Every call fails as if the backend were down.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// The first `count` station detail fetches fail, later ones succeed.
    pub fn with_details_failures(self, count: usize) -> Self {
        self.details_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Only the bulk prediction route fails.
    pub fn predictions_failing(mut self) -> Self {
        self.predictions_failing = true;
        self
    }

    /// Runs `hook` inside every prediction fetch, before it returns.
    pub fn on_prediction(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.prediction_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn requested_dates(&self) -> Vec<String> {
        self.dates.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        [
            &self.details_calls,
            &self.prediction_calls,
            &self.all_predictions_calls,
            &self.all_details_calls,
            &self.stations_calls,
            &self.search_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    fn record(&self, at: &NormalizedInstant) {
        self.dates.lock().unwrap().push(at.wire_format());
        if let Some(hook) = self.prediction_hook.lock().unwrap().as_ref() {
            hook();
        }
    }
}

#[async_trait]
impl ForecastSource for FakeSource {
    async fn station_details(&self, id: StationId) -> Result<StationDetails> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        let flaky = self
            .details_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if self.failing || flaky {
            return Err(ForecastError::Status {
                status: 503,
                url: format!("station/{}", id),
            });
        }
        self.details
            .get(&id)
            .cloned()
            .ok_or_else(|| ForecastError::NotFound(format!("station/{}", id)))
    }

    async fn prediction(&self, id: StationId, at: &NormalizedInstant) -> Option<Prediction> {
        self.prediction_calls.fetch_add(1, Ordering::SeqCst);
        self.record(at);
        if self.failing {
            return None;
        }
        self.predictions.get(&id).map(|p| p.at(*at))
    }

    async fn all_predictions(&self, at: &NormalizedInstant) -> Option<HashMap<StationId, Prediction>> {
        self.all_predictions_calls.fetch_add(1, Ordering::SeqCst);
        self.record(at);
        if self.failing || self.predictions_failing {
            return None;
        }
        Some(
            self.predictions
                .iter()
                .map(|(id, p)| (*id, p.at(*at)))
                .collect(),
        )
    }

    async fn all_station_details(&self) -> HashMap<StationId, StationDetails> {
        self.all_details_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return HashMap::new();
        }
        self.details.clone()
    }

    async fn stations(&self) -> Vec<Station> {
        self.stations_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Vec::new();
        }
        self.stations.clone()
    }

    async fn search_stations(&self, query: &str) -> Vec<Station> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let query = query.to_lowercase();
        self.stations
            .iter()
            .filter(|s| {
                self.details
                    .get(&s.id)
                    .is_some_and(|d| d.name.to_lowercase().contains(&query))
            })
            .copied()
            .collect()
    }

    async fn weather_forecast(&self) -> Option<HashMap<String, WeatherForecast>> {
        if self.failing {
            return None;
        }
        Some(HashMap::from([(
            "1".to_string(),
            WeatherForecast {
                temperature_2m: 18.5,
                precipitation: 0.0,
                wind_speed_10m: 12.0,
                precipitation_probability: 5.0,
                weather_code: 1,
            },
        )]))
    }
}
