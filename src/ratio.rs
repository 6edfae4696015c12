use std::collections::HashMap;

use crate::models::{Prediction, StationDetails, StationId};

/// Share of a station's docks predicted to hold a bike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Value(f64),
    NoData,
}

/// Missing prediction or missing details yield `NoData`. A zero capacity yields 0,
/// and a prediction above capacity is clamped to 1.
pub fn compute_ratio(
    id: StationId,
    predictions: &HashMap<StationId, Prediction>,
    details: &HashMap<StationId, StationDetails>,
) -> Ratio {
    let Some(prediction) = predictions.get(&id) else {
        return Ratio::NoData;
    };
    let Some(station) = details.get(&id) else {
        return Ratio::NoData;
    };

    ratio_of(prediction.available_bikes, station.capacity)
}

pub fn ratio_of(available_bikes: u32, capacity: u32) -> Ratio {
    if capacity == 0 {
        return Ratio::Value(0.0);
    }

    let raw = f64::from(available_bikes) / f64::from(capacity);
    if raw > 1.0 {
        log::warn!(
            "⚠️  Predicted {} bikes for a capacity of {}, clamping ratio to 1",
            available_bikes,
            capacity
        );
    }
    Ratio::Value(raw.clamp(0.0, 1.0))
}
