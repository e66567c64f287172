use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable that overrides `weather.api_key`
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// One problem found in a config file
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    /// Dotted path of the offending key, e.g. `weather.base_url`
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.field)
    }
}

/// Errors make the config unusable; warnings are only logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(issue(field, message));
    }

    pub fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(issue(field, message));
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        parts.join("; ")
    }
}

fn issue(field: &str, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        field: field.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and the saved city list
    pub config_dir: PathBuf,

    /// OpenWeatherMap settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Dashboard behaviour
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Fixed location used by the "here" command
    #[serde(default)]
    pub location: LocationConfig,
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_use_celsius(use_celsius: bool) -> Self {
        if use_celsius {
            Self::Celsius
        } else {
            Self::Fahrenheit
        }
    }

    pub fn is_celsius(self) -> bool {
        self == Self::Celsius
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

impl std::str::FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" | "metric" => Ok(Self::Celsius),
            "f" | "fahrenheit" | "imperial" => Ok(Self::Fahrenheit),
            other => Err(format!("unknown temperature unit: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key (overridden by OPENWEATHER_API_KEY)
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the current/forecast endpoints
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the geocoding endpoints
    #[serde(default = "default_geo_url")]
    pub geo_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_geo_url() -> String {
    "https://api.openweathermap.org/geo/1.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            geo_url: default_geo_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WeatherConfig {
    /// API key with the environment override applied
    pub fn effective_api_key(&self) -> String {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| self.api_key.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Unit used when no saved preference exists
    #[serde(default)]
    pub default_unit: TemperatureUnit,

    /// Pause between cities during restore/refresh, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Cities added on first launch when nothing is saved
    #[serde(default)]
    pub demo_cities: Vec<String>,
}

fn default_pacing_ms() -> u64 {
    200
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_unit: TemperatureUnit::Celsius,
            pacing_ms: default_pacing_ms(),
            demo_cities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationConfig {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            weather: WeatherConfig::default(),
            dashboard: DashboardConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("atmos")
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, creating it if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load and validate. Errors abort; warnings are logged and returned.
    pub fn load_validated(config_path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match config_path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };

        let report = config.validate();
        anyhow::ensure!(report.is_valid(), "Invalid configuration: {}", report.summary());
        for warning in &report.warnings {
            tracing::warn!("Config: {}", warning);
        }

        Ok((config, report))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        check_http_url("weather.base_url", &self.weather.base_url, &mut result);
        check_http_url("weather.geo_url", &self.weather.geo_url, &mut result);

        if self.weather.effective_api_key().trim().is_empty() {
            result.warn(
                "weather.api_key",
                format!("No API key configured (set it here or via {API_KEY_ENV})"),
            );
        }

        if self.weather.request_timeout_secs == 0 {
            result.error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.weather.request_timeout_secs > 120 {
            result.warn(
                "weather.request_timeout_secs",
                "Request timeout is unusually long (>120s)",
            );
        }

        if self.dashboard.pacing_ms > 10_000 {
            result.warn(
                "dashboard.pacing_ms",
                "Pause between cities is more than 10 seconds",
            );
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.error("location.latitude", "Latitude must be within [-90, 90]");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.error(
                        "location.longitude",
                        "Longitude must be within [-180, 180]",
                    );
                }
            }
            (None, None) => {}
            _ => result.warn(
                "location",
                "Both latitude and longitude are needed; location is ignored",
            ),
        }

        result
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("atmos");

        Ok(config_dir.join("config.toml"))
    }
}

fn check_http_url(field: &str, raw: &str, result: &mut ValidationResult) {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            result.error(field, format!("not a URL: {e}"));
            return;
        }
    };
    if !matches!(url.scheme(), "http" | "https") {
        result.error(field, format!("expected an http(s) URL, got {}://", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        result.error(field, "URL has no host");
    }
}
