// Bulk recoloring of every marker from one predictions fetch and one details fetch.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::color::{Color, color_for};
use crate::marker::MarkerEntity;
use crate::models::StationId;
use crate::ratio::{Ratio, compute_ratio};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Selected instant is not in the future; everything painted neutral without a fetch.
    NotFuture,
    /// Bulk predictions could not be fetched; everything painted neutral.
    PredictionsUnavailable,
    Colored { with_data: usize, without_data: usize },
    /// The selected instant changed while fetching; nothing was applied.
    Discarded,
}

pub struct FleetColorSync {
    ctx: AppState,
}

impl FleetColorSync {
    pub fn new(ctx: AppState) -> Self {
        Self { ctx }
    }

    /// Recolors every marker and returns the resulting marker list.
    pub async fn run(&self) -> Vec<MarkerEntity> {
        self.sync().await;
        self.ctx.markers.snapshot()
    }

    pub async fn sync(&self) -> SyncOutcome {
        let selected = self.ctx.selected.get();
        let ids = self.ctx.markers.ids();

        let Some(at) = self.ctx.normalizer.normalize(selected, self.ctx.clock.now()) else {
            self.paint_all(&ids, Color::Neutral);
            log::info!("🎨 {} is not in the future, {} markers set to neutral", selected, ids.len());
            return SyncOutcome::NotFuture;
        };

        let Some(predictions) = self.ctx.source.all_predictions(&at).await else {
            if !self.still_selected(selected) {
                return SyncOutcome::Discarded;
            }
            self.paint_all(&ids, Color::Neutral);
            log::warn!("⚠️  No predictions for {}, {} markers set to neutral", at, ids.len());
            return SyncOutcome::PredictionsUnavailable;
        };

        let details = self.ctx.source.all_station_details().await;
        if !self.still_selected(selected) {
            return SyncOutcome::Discarded;
        }

        let mut with_data = 0;
        let mut without_data = 0;
        for id in &ids {
            let ratio = compute_ratio(*id, &predictions, &details);
            match ratio {
                Ratio::Value(_) => with_data += 1,
                Ratio::NoData => without_data += 1,
            }
            self.recolor(*id, color_for(ratio, true));
        }

        log::info!(
            "✓ Recolored {} markers for {} ({} without data)",
            with_data + without_data,
            at,
            without_data
        );
        SyncOutcome::Colored { with_data, without_data }
    }

    fn still_selected(&self, selected: DateTime<Utc>) -> bool {
        let current = self.ctx.selected.get();
        if current != selected {
            log::debug!("Discarding fleet sync for {}, selection is now {}", selected, current);
            return false;
        }
        true
    }

    fn paint_all(&self, ids: &[StationId], color: Color) {
        for id in ids {
            self.recolor(*id, color);
        }
    }

    fn recolor(&self, id: StationId, color: Color) {
        // A reload may have removed the marker since the snapshot.
        let result = self
            .ctx
            .controller(id)
            .and_then(|controller| controller.recolor(color));
        if let Err(e) = result {
            log::debug!("Skipping recolor: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeSource, app_state, details, station, utc};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn past_instant_paints_neutral_without_fetching() {
        let source = Arc::new(
            FakeSource::default()
                .with_details(details(1, "Bellecour", 10))
                .with_prediction(1, 3, 7),
        );
        let state = app_state(source.clone(), utc(2024, 5, 1, 8, 0));
        state.markers.replace_all(vec![station(1), station(2)]);
        state.markers.update(1, |m| m.set_color(Color::Rgb(0, 255, 0))).unwrap();
        state.select_instant(utc(2024, 4, 30, 18, 0));

        let markers = state.fleet_sync().run().await;

        assert!(markers.iter().all(|m| m.color == Color::Neutral));
        assert_eq!(source.total_calls(), 0);
    }

    #[tokio::test]
    async fn future_instant_colors_from_ratio() {
        let source = Arc::new(
            FakeSource::default()
                .with_details(details(1, "Bellecour", 10))
                .with_prediction(1, 3, 7),
        );
        let state = app_state(source.clone(), utc(2024, 5, 1, 8, 0));
        state.markers.insert(station(1)).unwrap();
        state.select_instant(utc(2024, 5, 1, 12, 25));

        let outcome = state.fleet_sync().sync().await;

        assert_eq!(outcome, SyncOutcome::Colored { with_data: 1, without_data: 0 });
        assert_eq!(state.markers.get(1).unwrap().color, Color::Rgb(179, 77, 0));
        assert_eq!(source.all_predictions_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.all_details_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.prediction_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_station_data_is_neutral_per_marker() {
        let source = Arc::new(
            FakeSource::default()
                .with_details(details(1, "Bellecour", 10))
                .with_prediction(1, 10, 0)
                .with_prediction(2, 4, 4)
                .with_details(details(3, "Perrache", 0))
                .with_prediction(3, 0, 0),
        );
        let state = app_state(source, utc(2024, 5, 1, 8, 0));
        state.markers.replace_all(vec![station(1), station(2), station(3)]);
        state.select_instant(utc(2024, 5, 1, 12, 0));

        let outcome = state.fleet_sync().sync().await;

        assert_eq!(outcome, SyncOutcome::Colored { with_data: 2, without_data: 1 });
        assert_eq!(state.markers.get(1).unwrap().color, Color::Rgb(0, 255, 0));
        assert_eq!(state.markers.get(2).unwrap().color, Color::Neutral);
        assert_eq!(state.markers.get(3).unwrap().color, Color::Rgb(255, 0, 0));
    }

    #[tokio::test]
    async fn failed_bulk_fetch_paints_everything_neutral() {
        let source = Arc::new(
            FakeSource::default()
                .with_details(details(1, "Bellecour", 10))
                .with_prediction(1, 5, 5)
                .predictions_failing(),
        );
        let state = app_state(source.clone(), utc(2024, 5, 1, 8, 0));
        state.markers.replace_all(vec![station(1), station(2)]);
        state.markers.update(1, |m| m.set_color(Color::Rgb(128, 128, 0))).unwrap();
        state.select_instant(utc(2024, 5, 1, 12, 0));

        let outcome = state.fleet_sync().sync().await;

        assert_eq!(outcome, SyncOutcome::PredictionsUnavailable);
        assert!(state.markers.snapshot().iter().all(|m| m.color == Color::Neutral));
        assert_eq!(source.all_details_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sync_for_superseded_instant_applies_nothing() {
        let source = Arc::new(
            FakeSource::default()
                .with_details(details(1, "Bellecour", 10))
                .with_prediction(1, 10, 0),
        );
        let state = app_state(source.clone(), utc(2024, 5, 1, 8, 0));
        state.markers.insert(station(1)).unwrap();
        state.select_instant(utc(2024, 5, 1, 12, 0));

        let moved = state.clone();
        source.on_prediction(move || {
            moved.select_instant(utc(2024, 5, 1, 20, 0));
        });

        let outcome = state.fleet_sync().sync().await;

        assert_eq!(outcome, SyncOutcome::Discarded);
        assert_eq!(state.markers.get(1).unwrap().color, Color::Neutral);
    }
}
