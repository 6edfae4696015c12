// Forecast backend client. Every public fetch swallows transport and status
// failures, logs them, and hands back None / an empty collection instead.

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ForecastError;
use crate::models::{
    KeyedCollection, Prediction, PredictionPayload, Station, StationDetails, StationId,
    WeatherForecast,
};
use crate::time::NormalizedInstant;

pub type Result<T> = std::result::Result<T, ForecastError>;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/";

#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn station_details(&self, id: StationId) -> Result<StationDetails>;

    async fn prediction(&self, id: StationId, at: &NormalizedInstant) -> Option<Prediction>;

    async fn all_predictions(&self, at: &NormalizedInstant) -> Option<HashMap<StationId, Prediction>>;

    async fn all_station_details(&self) -> HashMap<StationId, StationDetails>;

    async fn stations(&self) -> Vec<Station>;

    async fn search_stations(&self, query: &str) -> Vec<Station>;

    async fn weather_forecast(&self) -> Option<HashMap<String, WeatherForecast>>;

    /// `None` for the instant means it had no normalized form (not in the future);
    /// that and a missing prediction both come back as `None`.
    async fn prediction_for(
        &self,
        id: StationId,
        at: Option<&NormalizedInstant>,
    ) -> Option<Prediction> {
        match at {
            Some(at) => self.prediction(id, at).await,
            None => None,
        }
    }
}

pub struct ForecastClient {
    http: reqwest::Client,
    base: Url,
    details_cache: Cache<StationId, StationDetails>,
}

impl ForecastClient {
    const REQUEST_TIMEOUT_SECS: u64 = 30;
    const DETAILS_CACHE_CAPACITY: u64 = 4096;

    pub fn new(base: &str) -> Result<Self> {
        Self::with_options(
            base,
            Duration::from_secs(Self::REQUEST_TIMEOUT_SECS),
            Self::DETAILS_CACHE_CAPACITY,
        )
    }

    pub fn with_options(base: &str, timeout: Duration, cache_capacity: u64) -> Result<Self> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        let base: Url = base
            .parse()
            .map_err(|e| ForecastError::InvalidUrl(format!("{} is not a valid url: {}", base, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForecastError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            details_cache: Cache::builder().max_capacity(cache_capacity).build(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ForecastError::InvalidUrl(format!("error joining {}: {}", path, e)))
    }

    fn segment_endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ForecastError::InvalidUrl(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        log::debug!("📡 GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ForecastError::Network(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ForecastError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(ForecastError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::Network(format!("Failed to read response: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| ForecastError::Parse(format!("Invalid JSON from {}: {}", url, e)))
    }

    async fn fetch_predictions(&self, at: &NormalizedInstant) -> Result<HashMap<StationId, Prediction>> {
        let url = self.endpoint(&format!("predictions?date={}", at.query_value()))?;
        let collection: KeyedCollection<PredictionPayload> = self.fetch_json(url).await?;

        Ok(collection
            .into_map()
            .into_iter()
            .map(|(id, payload)| (id, payload.at(*at)))
            .collect())
    }

    async fn fetch_detailed_stations(&self) -> Result<HashMap<StationId, StationDetails>> {
        let url = self.endpoint("detailed_stations")?;
        let collection: KeyedCollection<StationDetails> = self.fetch_json(url).await?;
        Ok(collection.into_map())
    }
}

#[async_trait]
impl ForecastSource for ForecastClient {
    async fn station_details(&self, id: StationId) -> Result<StationDetails> {
        if let Some(details) = self.details_cache.get(&id).await {
            return Ok(details);
        }

        let url = self.segment_endpoint(&["station", &id.to_string()])?;
        match self.fetch_json::<StationDetails>(url).await {
            Ok(details) => {
                self.details_cache.insert(id, details.clone()).await;
                Ok(details)
            }
            Err(e) => {
                log::warn!("⚠️  Failed to fetch details for station {}: {}", id, e);
                Err(e)
            }
        }
    }

    async fn prediction(&self, id: StationId, at: &NormalizedInstant) -> Option<Prediction> {
        let url = match self.endpoint(&format!("predict?id={}&date={}", id, at.query_value())) {
            Ok(url) => url,
            Err(e) => {
                log::error!("❌ {}", e);
                return None;
            }
        };

        match self.fetch_json::<PredictionPayload>(url).await {
            Ok(payload) => Some(payload.at(*at)),
            Err(e) => {
                log::warn!("⚠️  Error fetching prediction for station {} at {}: {}", id, at, e);
                None
            }
        }
    }

    async fn all_predictions(&self, at: &NormalizedInstant) -> Option<HashMap<StationId, Prediction>> {
        match self.fetch_predictions(at).await {
            Ok(predictions) => {
                log::info!("📊 Loaded {} predictions for {}", predictions.len(), at);
                Some(predictions)
            }
            Err(e) => {
                log::warn!("⚠️  Error fetching predictions for {}: {}", at, e);
                None
            }
        }
    }

    async fn all_station_details(&self) -> HashMap<StationId, StationDetails> {
        match self.fetch_detailed_stations().await {
            Ok(details) => {
                for (id, station) in &details {
                    self.details_cache.insert(*id, station.clone()).await;
                }
                details
            }
            Err(e) => {
                log::warn!("⚠️  Error fetching detailed stations: {}", e);
                HashMap::new()
            }
        }
    }

    async fn stations(&self) -> Vec<Station> {
        let result = match self.endpoint("stations") {
            Ok(url) => self.fetch_json::<Vec<Station>>(url).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            log::error!("❌ Error fetching stations: {}", e);
            Vec::new()
        })
    }

    async fn search_stations(&self, query: &str) -> Vec<Station> {
        let result = match self.segment_endpoint(&["search", query]) {
            Ok(url) => self.fetch_json::<Vec<Station>>(url).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            log::warn!("⚠️  Error searching stations for '{}': {}", query, e);
            Vec::new()
        })
    }

    async fn weather_forecast(&self) -> Option<HashMap<String, WeatherForecast>> {
        let result = match self.endpoint("weather_forecast") {
            Ok(url) => self.fetch_json::<HashMap<String, WeatherForecast>>(url).await,
            Err(e) => Err(e),
        };

        result
            .map_err(|e| log::warn!("⚠️  Error fetching weather forecast: {}", e))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = ForecastClient::new("http://localhost:8000").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ForecastClient::new("not a url").err().unwrap();
        assert!(matches!(err, ForecastError::InvalidUrl(_)));
    }

    #[test]
    fn predict_url_keeps_encoded_colons() {
        let client = ForecastClient::new(DEFAULT_BACKEND_URL).unwrap();
        let url = client
            .endpoint("predict?id=12&date=2024-05-01T15%3A00%3A00")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:8000/predict?id=12&date=2024-05-01T15%3A00%3A00"
        );
    }

    #[test]
    fn search_query_is_a_single_path_segment() {
        let client = ForecastClient::new("http://localhost:8000/api/").unwrap();
        let url = client.segment_endpoint(&["search", "part dieu/sud"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost:8000/api/search/part%20dieu%2Fsud");
    }
}
