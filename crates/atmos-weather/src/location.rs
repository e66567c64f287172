//! Sources of "where am I" for adding the current location.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location request timed out")]
    Timeout,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<Location, LocationError>;
}

/// Location taken from the `[location]` config section.
///
/// Without coordinates it behaves like a user who declined the permission prompt.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    coordinates: Option<(f64, f64)>,
}

impl ConfiguredLocation {
    pub fn new(coordinates: Option<(f64, f64)>) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl LocationProvider for ConfiguredLocation {
    async fn current_location(&self) -> Result<Location, LocationError> {
        self.coordinates
            .map(|(latitude, longitude)| Location {
                latitude,
                longitude,
            })
            .ok_or(LocationError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_location() {
        let provider = ConfiguredLocation::new(Some((47.6062, -122.3321)));
        let loc = provider.current_location().await.unwrap();
        assert_eq!(loc.latitude, 47.6062);
        assert_eq!(loc.longitude, -122.3321);
    }

    #[tokio::test]
    async fn test_unconfigured_location_is_denied() {
        let provider = ConfiguredLocation::default();
        let result = provider.current_location().await;
        assert!(matches!(result, Err(LocationError::PermissionDenied)));
    }
}
