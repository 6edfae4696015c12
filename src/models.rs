// Data models for the Vélo'v forecast backend (stations, details, predictions, weather)
//
// Backend Endpoints (default base: http://localhost:8000/):
// - Stations: GET /stations
// - Detailed stations: GET /detailed_stations
// - Station details: GET /station/{id}
// - Single prediction: GET /predict?id={id}&date={date}
// - All predictions: GET /predictions?date={date}
// - Weather forecast: GET /weather_forecast
// - Search: GET /search/{query}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::time::NormalizedInstant;

pub type StationId = u32;

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDetails {
    pub id: StationId,
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(alias = "adress", default)]
    pub address: String,
    #[serde(default)]
    pub area: String,
    pub capacity: u32,
}

/// Prediction as sent by the backend, before it is bound to the instant it was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub id: StationId,
    pub free_stands: u32,
    pub available_bikes: u32,
}

impl PredictionPayload {
    pub fn at(self, instant: NormalizedInstant) -> Prediction {
        Prediction {
            id: self.id,
            available_bikes: self.available_bikes,
            free_stands: self.free_stands,
            instant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub id: StationId,
    pub available_bikes: u32,
    pub free_stands: u32,
    pub instant: NormalizedInstant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub temperature_2m: f64,
    pub precipitation: f64,
    pub wind_speed_10m: f64,
    pub precipitation_probability: f64,
    pub weather_code: u16,
}

// ============================================================================
// Keyed collections
// ============================================================================

pub trait HasStationId {
    fn station_id(&self) -> StationId;
}

impl HasStationId for StationDetails {
    fn station_id(&self) -> StationId {
        self.id
    }
}

impl HasStationId for PredictionPayload {
    fn station_id(&self) -> StationId {
        self.id
    }
}

/// The bulk endpoints answer either with an object keyed by station id or with a plain list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KeyedCollection<T> {
    Map(HashMap<String, T>),
    List(Vec<T>),
}

impl<T: HasStationId> KeyedCollection<T> {
    pub fn into_map(self) -> HashMap<StationId, T> {
        match self {
            KeyedCollection::Map(entries) => entries
                .into_iter()
                .filter_map(|(key, value)| match key.parse::<StationId>() {
                    Ok(id) => Some((id, value)),
                    Err(_) => {
                        log::warn!("⚠️  Skipping entry with non-numeric station key '{}'", key);
                        None
                    }
                })
                .collect(),
            KeyedCollection::List(values) => values
                .into_iter()
                .map(|value| (value.station_id(), value))
                .collect(),
        }
    }
}
