//! Weather dashboard engine for Atmos
//!
//! Fetches OpenWeatherMap conditions and forecasts, keeps the ordered list of
//! tracked cities and persists it between sessions. Presentation lives with
//! whoever subscribes to [`RenderEvent`]s.

pub mod client;
pub mod controller;
pub mod forecast;
pub mod format;
pub mod geocode;
pub mod location;
pub mod store;
pub mod types;

pub use types::*;
pub use client::{WeatherClient, WeatherSource, DEFAULT_SUGGESTION_LIMIT};
pub use controller::{BatchOutcome, CityListController, CityState, RenderEvent};
pub use forecast::daily_forecast;
pub use location::{ConfiguredLocation, Location, LocationError, LocationProvider};
pub use store::{FileBackend, MemoryBackend, PersistedCityStore, PersistedState, StorageBackend};
