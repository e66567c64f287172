//! The authoritative list of displayed cities.
//!
//! `CityListController` owns the ordered city list, sequences every
//! add/remove/refresh against it, writes each mutation through to the
//! [`PersistedCityStore`] and tells renderers what changed via [`RenderEvent`]s.
//! It never draws anything itself.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use atmos_core::WeatherError;
use chrono::Utc;

use crate::client::{WeatherSource, DEFAULT_SUGGESTION_LIMIT};
use crate::forecast::daily_forecast;
use crate::location::LocationProvider;
use crate::store::{PersistedCityStore, PersistedState};
use crate::types::{
    CityKey, CityQuery, CitySuggestion, CurrentWeather, ForecastResponse, TemperatureUnit,
    WeatherSnapshot,
};

/// Pause between cities during restore/refresh
pub const DEFAULT_PACING: Duration = Duration::from_millis(200);

/// How long to wait for a location fix before treating it as denied
pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-key outcome of a batch operation
pub type BatchOutcome = Vec<(CityKey, Result<WeatherSnapshot, WeatherError>)>;

/// Messages for renderers. Renderers observe these and never call back into
/// the controller's state.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    /// Draw or replace the card for `snapshot.key`
    Render {
        snapshot: WeatherSnapshot,
        unit: TemperatureUnit,
        last_updated: Option<i64>,
    },
    /// Drop the card for `key`
    Remove { key: CityKey },
    /// No cards remain
    BecameEmpty,
    /// Every card was dropped at once
    Cleared,
    /// Re-format displayed temperatures, no new data
    Reformat { unit: TemperatureUnit },
    /// The city is already on screen
    Duplicate { key: CityKey },
    /// An operation failed; nothing changed
    Failed {
        key: Option<CityKey>,
        message: &'static str,
        detail: String,
    },
}

/// Everything the dashboard tracks for this session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CityState {
    /// Persisted keys in insertion order
    saved_cities: Vec<CityKey>,
    /// Epoch millis of the last successful fetch
    last_updated: BTreeMap<CityKey, i64>,
    /// Keys with a card on screen, in the order their cards appeared
    displayed: Vec<CityKey>,
    unit: TemperatureUnit,
}

impl CityState {
    fn from_persisted(persisted: PersistedState) -> Self {
        Self {
            saved_cities: persisted.cities,
            last_updated: persisted.last_updated,
            displayed: Vec::new(),
            unit: TemperatureUnit::from_use_celsius(persisted.use_celsius),
        }
    }

    fn to_persisted(&self) -> PersistedState {
        PersistedState {
            cities: self.saved_cities.clone(),
            use_celsius: self.unit.is_celsius(),
            last_updated: self.last_updated.clone(),
            timestamp: 0,
        }
    }

    fn is_displayed(&self, key: &CityKey) -> bool {
        self.displayed.contains(key)
    }

    /// Remove every trace of `key`. Returns whether anything changed.
    fn forget(&mut self, key: &CityKey) -> bool {
        let before = (
            self.saved_cities.len(),
            self.last_updated.len(),
            self.displayed.len(),
        );
        self.saved_cities.retain(|k| k != key);
        self.last_updated.remove(key);
        self.displayed.retain(|k| k != key);
        before
            != (
                self.saved_cities.len(),
                self.last_updated.len(),
                self.displayed.len(),
            )
    }
}

pub struct CityListController {
    source: Arc<dyn WeatherSource>,
    store: PersistedCityStore,
    state: CityState,
    subscribers: Vec<mpsc::Sender<RenderEvent>>,
    pacing: Duration,
}

impl CityListController {
    /// Build the controller from whatever the store has saved.
    pub fn new(source: Arc<dyn WeatherSource>, store: PersistedCityStore) -> Self {
        let state = CityState::from_persisted(store.load());
        tracing::debug!(
            "Controller starting with {} saved cities ({:?})",
            state.saved_cities.len(),
            state.unit
        );
        Self {
            source,
            store,
            state,
            subscribers: Vec::new(),
            pacing: DEFAULT_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// New channel receiving every event emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::Receiver<RenderEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn saved_cities(&self) -> &[CityKey] {
        &self.state.saved_cities
    }

    pub fn displayed(&self) -> &[CityKey] {
        &self.state.displayed
    }

    pub fn last_updated(&self, key: &CityKey) -> Option<i64> {
        self.state.last_updated.get(key).copied()
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.state.unit
    }

    pub fn is_empty(&self) -> bool {
        self.state.displayed.is_empty()
    }

    pub fn state(&self) -> &CityState {
        &self.state
    }

    /// Fetch and display a city.
    ///
    /// Rejected with `DuplicateCity`, before any fetch, when the provisional
    /// key already has a card. For names the canonical key is only known after
    /// the fetch, so a second check runs then. Nothing is mutated on failure.
    pub async fn add_city(
        &mut self,
        query: CityQuery,
        persist: bool,
    ) -> Result<WeatherSnapshot, WeatherError> {
        if let CityQuery::Name(name) = &query {
            if name.trim().is_empty() {
                return Err(WeatherError::InvalidQuery("empty city name".to_string()));
            }
        }

        let provisional = query.provisional_key();
        if self.state.is_displayed(&provisional) {
            return Err(self.duplicate(provisional));
        }

        let (current, forecast) = match self.source.fetch_bundle(&query).await {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::error!("Failed to add city {}: {}", query, e);
                self.emit_failure(Some(provisional), &e);
                return Err(e);
            }
        };

        let key = match &query {
            CityQuery::Name(_) => current.canonical_name_key().unwrap_or(provisional),
            CityQuery::Coords { .. } => provisional,
        };
        if self.state.is_displayed(&key) {
            return Err(self.duplicate(key));
        }

        let snapshot = build_snapshot(key, current, forecast);
        if persist && !self.state.saved_cities.contains(&snapshot.key) {
            self.state.saved_cities.push(snapshot.key.clone());
        }
        self.show(&snapshot);
        self.persist();

        tracing::info!("Added {}", snapshot.current.display_name());
        Ok(snapshot)
    }

    /// Add the provider's current position as a coordinate city.
    pub async fn add_current_location(
        &mut self,
        provider: &dyn LocationProvider,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let location =
            match tokio::time::timeout(GEOLOCATION_TIMEOUT, provider.current_location()).await {
                Ok(Ok(location)) => location,
                Ok(Err(e)) => {
                    tracing::warn!("Geolocation error: {}", e);
                    return Err(self.geolocation_denied(e.to_string()));
                }
                Err(_) => {
                    tracing::warn!("Geolocation timed out after {:?}", GEOLOCATION_TIMEOUT);
                    return Err(self.geolocation_denied("timed out".to_string()));
                }
            };

        self.add_city(
            CityQuery::Coords {
                lat: location.latitude,
                lon: location.longitude,
            },
            true,
        )
        .await
    }

    /// Stop tracking `key`. Removing an unknown key is a no-op.
    pub fn remove_city(&mut self, key: &CityKey) -> bool {
        let was_displayed = self.state.is_displayed(key);
        if !self.state.forget(key) {
            tracing::debug!("Remove of untracked city {} ignored", key);
            return false;
        }
        self.persist();

        if was_displayed {
            self.emit(RenderEvent::Remove { key: key.clone() });
            if self.state.displayed.is_empty() {
                self.emit(RenderEvent::BecameEmpty);
            }
        }
        tracing::info!("Removed {}", key);
        true
    }

    pub fn clear_all(&mut self) {
        self.state.saved_cities.clear();
        self.state.last_updated.clear();
        self.state.displayed.clear();
        self.persist();

        self.emit(RenderEvent::Cleared);
        self.emit(RenderEvent::BecameEmpty);
        tracing::info!("All cities cleared");
    }

    /// Re-display the saved cities, one at a time, in saved order.
    ///
    /// A city whose fetch fails is dropped for good; the rest carry on.
    pub async fn restore(&mut self) -> BatchOutcome {
        let keys = self.state.saved_cities.clone();
        if keys.is_empty() {
            self.emit(RenderEvent::BecameEmpty);
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(keys.len());
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                self.pace().await;
            }

            let result = self.fetch_key(&key).await;
            match &result {
                Ok(snapshot) => self.show(snapshot),
                Err(e) => {
                    tracing::error!("Failed to restore city {}: {}", key, e);
                    self.state.forget(&key);
                    self.emit_failure(Some(key.clone()), e);
                }
            }
            outcomes.push((key, result));
        }

        self.persist();
        if self.state.displayed.is_empty() {
            self.emit(RenderEvent::BecameEmpty);
        }
        outcomes
    }

    /// Re-fetch every saved city, one at a time. Failures are reported and
    /// the city stays saved.
    pub async fn refresh_all(&mut self) -> BatchOutcome {
        let keys = self.state.saved_cities.clone();

        let mut outcomes = Vec::with_capacity(keys.len());
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                self.pace().await;
            }

            let result = self.fetch_key(&key).await;
            match &result {
                Ok(snapshot) => self.show(snapshot),
                Err(e) => {
                    tracing::error!("Failed to refresh city {}: {}", key, e);
                    self.emit_failure(Some(key.clone()), e);
                }
            }
            outcomes.push((key, result));
        }

        if !outcomes.is_empty() {
            self.persist();
        }
        outcomes
    }

    /// Switch display units. Nothing is re-fetched.
    pub fn set_unit(&mut self, unit: TemperatureUnit) {
        self.state.unit = unit;
        self.persist();
        self.emit(RenderEvent::Reformat { unit });
    }

    /// Geocoding matches for a partial name.
    pub async fn suggest(&self, query: &str) -> Result<Vec<CitySuggestion>, WeatherError> {
        self.source
            .suggest_cities(query, DEFAULT_SUGGESTION_LIMIT)
            .await
    }

    async fn fetch_key(&self, key: &CityKey) -> Result<WeatherSnapshot, WeatherError> {
        let query = key
            .to_query()
            .ok_or_else(|| WeatherError::InvalidQuery(format!("unreadable key {key}")))?;
        let (current, forecast) = self.source.fetch_bundle(&query).await?;
        Ok(build_snapshot(key.clone(), current, forecast))
    }

    /// Record a successful fetch and hand the card to renderers.
    fn show(&mut self, snapshot: &WeatherSnapshot) {
        let now = Utc::now().timestamp_millis();
        self.state.last_updated.insert(snapshot.key.clone(), now);
        if !self.state.is_displayed(&snapshot.key) {
            self.state.displayed.push(snapshot.key.clone());
        }
        self.emit(RenderEvent::Render {
            snapshot: snapshot.clone(),
            unit: self.state.unit,
            last_updated: Some(now),
        });
    }

    fn duplicate(&mut self, key: CityKey) -> WeatherError {
        tracing::info!("City already displayed: {}", key);
        self.emit(RenderEvent::Duplicate { key: key.clone() });
        WeatherError::DuplicateCity(key.to_string())
    }

    fn geolocation_denied(&mut self, detail: String) -> WeatherError {
        let err = WeatherError::GeolocationDenied;
        self.emit(RenderEvent::Failed {
            key: None,
            message: err.user_message(),
            detail,
        });
        err
    }

    fn emit_failure(&mut self, key: Option<CityKey>, err: &WeatherError) {
        self.emit(RenderEvent::Failed {
            key,
            message: err.user_message(),
            detail: err.to_string(),
        });
    }

    fn emit(&mut self, event: RenderEvent) {
        // Dropped receivers are pruned on the way
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn persist(&self) {
        self.store.save(&self.state.to_persisted());
    }

    async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

fn build_snapshot(
    key: CityKey,
    current: CurrentWeather,
    forecast: ForecastResponse,
) -> WeatherSnapshot {
    let daily = daily_forecast(
        &forecast.list,
        Utc::now().date_naive(),
        forecast.city.timezone,
    );
    WeatherSnapshot {
        key,
        current,
        daily,
    }
}
