// Per-marker display state and the hover / click / recolor operations behind it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::color::{Color, IconHandle, render_icon};
use crate::error::MarkerError;
use crate::models::{Station, StationId};
use crate::state::AppState;

pub const NO_NAME_PLACEHOLDER: &str = "no available data";
pub const BIKES_UNAVAILABLE: &str = "indisponible";
pub const STANDS_UNAVAILABLE: &str = "insdisponible";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameState {
    Idle,
    Loading,
    Loaded(String),
}

/// Prediction text cached on a marker, tagged with the selected instant it was requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionState {
    Stale,
    Loading {
        instant: DateTime<Utc>,
    },
    Loaded {
        instant: DateTime<Utc>,
        available_bikes: String,
        free_stands: String,
    },
}

impl PredictionState {
    fn unavailable(instant: DateTime<Utc>) -> Self {
        PredictionState::Loaded {
            instant,
            available_bikes: BIKES_UNAVAILABLE.to_string(),
            free_stands: STANDS_UNAVAILABLE.to_string(),
        }
    }

    /// Bike and stand text for `selected`, or the placeholders when nothing
    /// trustworthy is cached for that instant.
    pub fn texts_for(&self, selected: DateTime<Utc>) -> (String, String) {
        match self {
            PredictionState::Loaded {
                instant,
                available_bikes,
                free_stands,
            } if *instant == selected => (available_bikes.clone(), free_stands.clone()),
            _ => (BIKES_UNAVAILABLE.to_string(), STANDS_UNAVAILABLE.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkerEntity {
    pub station: Station,
    pub name: NameState,
    pub prediction: PredictionState,
    pub color: Color,
    pub icon: IconHandle,
}

impl MarkerEntity {
    pub fn new(station: Station) -> Self {
        Self {
            station,
            name: NameState::Idle,
            prediction: PredictionState::Stale,
            color: Color::Neutral,
            icon: render_icon(Color::Neutral),
        }
    }

    pub fn id(&self) -> StationId {
        self.station.id
    }

    pub fn name(&self) -> Option<&str> {
        match &self.name {
            NameState::Loaded(name) => Some(name),
            _ => None,
        }
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.icon = render_icon(color);
    }

    pub fn invalidate_prediction(&mut self) {
        self.prediction = PredictionState::Stale;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Popup {
    pub station_id: StationId,
    pub name: String,
    pub available_bikes: String,
    pub free_stands: String,
}

impl fmt::Display for Popup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<h3>{}</h3><p>Velo'v disponibles : {}</p> <p>Bornes disponibles : {}</p>",
            self.name, self.available_bikes, self.free_stands
        )
    }
}

pub struct MarkerController {
    id: StationId,
    ctx: AppState,
}

impl MarkerController {
    pub fn new(ctx: AppState, id: StationId) -> Result<Self, MarkerError> {
        if !ctx.markers.contains(id) {
            return Err(MarkerError::UnknownMarker(id));
        }
        Ok(Self { id, ctx })
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn entity(&self) -> Result<MarkerEntity, MarkerError> {
        self.ctx.markers.get(self.id).ok_or(MarkerError::UnknownMarker(self.id))
    }

    /// Tooltip text. Fetches the name only if it was never loaded.
    pub async fn hover(&self) -> Result<String, MarkerError> {
        match self.entity()?.name {
            NameState::Loaded(name) => Ok(name),
            _ => self.refresh_station_name().await,
        }
    }

    /// Always refetches name and prediction, then builds the popup.
    pub async fn click(&self) -> Result<Popup, MarkerError> {
        let name = self.refresh_station_name().await?;
        let prediction = self.refresh_prediction().await?;
        let (available_bikes, free_stands) = prediction.texts_for(self.ctx.selected.get());

        Ok(Popup {
            station_id: self.id,
            name,
            available_bikes,
            free_stands,
        })
    }

    pub async fn refresh_station_name(&self) -> Result<String, MarkerError> {
        self.ctx.markers.update(self.id, |m| m.name = NameState::Loading)?;

        let name = match self.ctx.source.station_details(self.id).await {
            Ok(details) if !details.name.is_empty() => details.name,
            Ok(_) => NO_NAME_PLACEHOLDER.to_string(),
            Err(e) => {
                // Nothing was loaded; the next hover retries.
                log::debug!("Station {} name unavailable: {}", self.id, e);
                self.ctx.markers.update(self.id, |m| m.name = NameState::Idle)?;
                return Ok(NO_NAME_PLACEHOLDER.to_string());
            }
        };

        self.ctx
            .markers
            .update(self.id, |m| m.name = NameState::Loaded(name.clone()))?;
        Ok(name)
    }

    /// Fetches the prediction for the selected instant. A result that comes back
    /// after the selected instant moved on is dropped.
    pub async fn refresh_prediction(&self) -> Result<PredictionState, MarkerError> {
        let selected = self.ctx.selected.get();
        self.ctx
            .markers
            .update(self.id, |m| m.prediction = PredictionState::Loading { instant: selected })?;

        let normalized = self.ctx.normalizer.normalize(selected, self.ctx.clock.now());
        if normalized.is_none() {
            log::debug!("Date {} is not in the future, no prediction for station {}", selected, self.id);
        }

        let state = match self.ctx.source.prediction_for(self.id, normalized.as_ref()).await {
            Some(prediction) => PredictionState::Loaded {
                instant: selected,
                available_bikes: prediction.available_bikes.to_string(),
                free_stands: prediction.free_stands.to_string(),
            },
            None => PredictionState::unavailable(selected),
        };

        if self.ctx.selected.get() != selected {
            log::debug!("Discarding prediction for station {} requested at {}", self.id, selected);
            return Ok(self.entity()?.prediction);
        }

        self.ctx
            .markers
            .update(self.id, |m| m.prediction = state.clone())?;
        Ok(state)
    }

    pub fn recolor(&self, color: Color) -> Result<IconHandle, MarkerError> {
        self.ctx.markers.update(self.id, |m| {
            m.set_color(color);
            m.icon.clone()
        })
    }
}
