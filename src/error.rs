use thiserror::Error;

use crate::models::StationId;

/// Failures at the forecast backend boundary. Callers receive these as values, never as panics.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ForecastError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForecastError::NotFound(_))
    }
}

/// Misuse of the marker registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkerError {
    #[error("A marker already exists for station {0}")]
    DuplicateMarker(StationId),

    #[error("No marker for station {0}")]
    UnknownMarker(StationId),
}
