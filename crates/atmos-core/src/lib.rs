pub mod config;
pub mod error;

pub use config::{
    Config, ConfigIssue, DashboardConfig, LocationConfig, TemperatureUnit, ValidationResult,
    WeatherConfig,
};
pub use error::{NetworkError, ReqwestErrorExt, StorageError, WeatherError};

use anyhow::Result;

/// Initialize the core application
///
/// Logs go to stderr so they never interleave with rendered cards on stdout.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // Quiet by default; cards own the terminal
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("ATMOS core initialized");
    Ok(())
}
