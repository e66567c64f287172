//! OpenWeatherMap REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atmos_core::{ReqwestErrorExt, WeatherConfig, WeatherError};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{CityQuery, CitySuggestion, CurrentWeather, ForecastResponse};

const USER_AGENT: &str = concat!("atmos/", env!("CARGO_PKG_VERSION"));

/// Results requested from the geocoding endpoint while searching
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

/// The network seam the controller depends on.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current conditions and forecast for one location, fetched together.
    async fn fetch_bundle(
        &self,
        query: &CityQuery,
    ) -> Result<(CurrentWeather, ForecastResponse), WeatherError>;

    /// Geocoding matches for a partial city name.
    async fn suggest_cities(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitySuggestion>, WeatherError>;
}

/// Error body OpenWeatherMap sends with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    geo_url: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::FetchFailed(e.into_network_error().to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            api_key: config.effective_api_key(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            geo_url: config.geo_url.trim_end_matches('/').to_string(),
        })
    }

    /// Current conditions by name or coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_current(&self, query: &CityQuery) -> Result<CurrentWeather, WeatherError> {
        let url = format!("{}/weather", self.base_url);
        self.get_json(&url, &Self::location_params(query)).await
    }

    /// 5-day / 3-hour forecast by name or coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast(
        &self,
        query: &CityQuery,
    ) -> Result<ForecastResponse, WeatherError> {
        let url = format!("{}/forecast", self.base_url);
        self.get_json(&url, &Self::location_params(query)).await
    }

    /// Both requests issued concurrently; fails if either fails.
    pub async fn fetch_bundle(
        &self,
        query: &CityQuery,
    ) -> Result<(CurrentWeather, ForecastResponse), WeatherError> {
        tokio::try_join!(self.fetch_current(query), self.fetch_forecast(query))
    }

    pub async fn fetch_coord_bundle(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<(CurrentWeather, ForecastResponse), WeatherError> {
        self.fetch_bundle(&CityQuery::Coords { lat, lon }).await
    }

    fn location_params(query: &CityQuery) -> Vec<(&'static str, String)> {
        match query {
            CityQuery::Name(name) => vec![("q", name.trim().to_string())],
            CityQuery::Coords { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        }
    }

    pub(crate) fn geo_url(&self) -> &str {
        &self.geo_url
    }

    /// GET `url` with the API key and metric units appended.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("units", "metric"), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                let err = e.without_url().into_network_error();
                tracing::error!("API Error: {}", err);
                WeatherError::from(err)
            })?;

        self.handle_response(response).await
    }

    /// Collapse every non-success status into `FetchFailed`.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|e| {
                tracing::error!("Weather response parse error: {}", e);
                WeatherError::FetchFailed(format!("JSON parse error: {}", e))
            });
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.message)
            .ok()
            .filter(|m| !m.is_empty())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => tracing::info!("Location not found: {}", message),
            StatusCode::TOO_MANY_REQUESTS => tracing::warn!("Weather API rate limit hit"),
            StatusCode::UNAUTHORIZED => tracing::warn!("Weather API rejected the API key"),
            _ => tracing::error!("Weather API returned {}: {}", status, message),
        }

        Err(WeatherError::FetchFailed(format!(
            "HTTP {}: {}",
            status.as_u16(),
            message
        )))
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch_bundle(
        &self,
        query: &CityQuery,
    ) -> Result<(CurrentWeather, ForecastResponse), WeatherError> {
        WeatherClient::fetch_bundle(self, query).await
    }

    async fn suggest_cities(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitySuggestion>, WeatherError> {
        WeatherClient::suggest_cities(self, query, limit).await
    }
}
