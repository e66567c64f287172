//! Error types shared by the ATMOS crates.
//!
//! `WeatherError::user_message()` gives the short notification text; the
//! `Display` forms keep the detail for logs.

use thiserror::Error;

/// Transport-level failures talking to the weather service.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("could not reach the server: {0}")]
    Unreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unreadable response: {0}")]
    BadBody(String),
}

/// Dashboard operation failures.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("City already displayed: {0}")]
    DuplicateCity(String),

    #[error("Failed to fetch weather data: {0}")]
    FetchFailed(String),

    #[error("Location permission denied")]
    GeolocationDenied,

    #[error("Invalid city: {0}")]
    InvalidQuery(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::DuplicateCity(_) => "City already displayed",
            WeatherError::FetchFailed(_) => "Failed to fetch weather data",
            WeatherError::GeolocationDenied => "Location permission denied",
            WeatherError::InvalidQuery(_) => "Enter a city name to add",
        }
    }
}

impl From<NetworkError> for WeatherError {
    fn from(err: NetworkError) -> Self {
        WeatherError::FetchFailed(err.to_string())
    }
}

/// Saved-state backend failures. Logged, never fatal.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write saved cities: {0}")]
    WriteFailed(String),

    #[error("Saved data is malformed: {0}")]
    Malformed(String),
}

/// Classify a reqwest failure.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::BadBody(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::Status {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::Unreachable(self.to_string())
        }
    }
}
