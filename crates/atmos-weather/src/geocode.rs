//! Direct geocoding: turn a partial city name into candidate places.
//! Uses the OpenWeatherMap geocoding API with the same key as the weather calls.

use atmos_core::WeatherError;
use serde::Deserialize;
use tracing::instrument;

use crate::client::WeatherClient;
use crate::types::CitySuggestion;

#[derive(Debug, Deserialize)]
struct DirectGeocodeEntry {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: String,
    lat: f64,
    lon: f64,
}

impl From<DirectGeocodeEntry> for CitySuggestion {
    fn from(entry: DirectGeocodeEntry) -> Self {
        Self {
            name: entry.name,
            state: entry.state,
            country: entry.country,
            lat: entry.lat,
            lon: entry.lon,
        }
    }
}

impl WeatherClient {
    /// Up to `limit` places matching `query`. Blank queries return nothing
    /// without touching the network.
    #[instrument(skip(self), level = "info")]
    pub async fn suggest_cities(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitySuggestion>, WeatherError> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let url = format!("{}/direct", self.geo_url());
        let entries: Vec<DirectGeocodeEntry> = self
            .get_json(
                &url,
                &[("q", query.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        tracing::debug!("Geocoding '{}' returned {} matches", query, entries.len());
        Ok(entries.into_iter().map(CitySuggestion::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_core::WeatherConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WeatherClient {
        let config = WeatherConfig {
            api_key: "geo_key".to_string(),
            base_url: format!("{}/data/2.5", server.uri()),
            geo_url: format!("{}/geo/1.0", server.uri()),
            request_timeout_secs: 5,
        };
        WeatherClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_suggest_cities() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Portland"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Portland", "state": "Oregon", "country": "US", "lat": 45.52, "lon": -122.67},
                {"name": "Portland", "state": "Maine", "country": "US", "lat": 43.66, "lon": -70.25}
            ])))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let suggestions = client.suggest_cities("Portland", 5).await.unwrap();

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].full_name(), "Portland, Oregon, US");
        assert_eq!(suggestions[1].state.as_deref(), Some("Maine"));
    }

    #[tokio::test]
    async fn test_blank_query_skips_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let suggestions = client.suggest_cities("   ", 5).await.unwrap();
        assert!(suggestions.is_empty());
    }
}
