use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use atmos_core::TemperatureUnit;

/// Normalized identifier of a tracked location.
///
/// Either a lower-cased city name (`"london"`) or a coordinate key
/// (`"@51.507,-0.128"`). Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityKey(String);

impl CityKey {
    /// Key for a free-text city name: trimmed and lower-cased.
    pub fn from_name(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    /// Key for a coordinate pair, rounded to 3 decimal places.
    ///
    /// Exact halves round away from zero, so keys written by earlier
    /// sessions keep matching.
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self(format!("@{},{}", fixed3(lat), fixed3(lon)))
    }

    /// Wrap an already-normalized key, e.g. one read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_coordinate(&self) -> bool {
        self.0.starts_with('@')
    }

    /// Parse a coordinate key back into `(lat, lon)`.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let rest = self.0.strip_prefix('@')?;
        let (lat, lon) = rest.split_once(',')?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let lon = lon.trim().parse::<f64>().ok()?;
        (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
    }

    /// The request that re-fetches this key, if it is well formed.
    pub fn to_query(&self) -> Option<CityQuery> {
        if self.is_coordinate() {
            self.coordinates()
                .map(|(lat, lon)| CityQuery::Coords { lat, lon })
        } else if self.is_empty() {
            None
        } else {
            Some(CityQuery::Name(self.0.clone()))
        }
    }
}

impl std::fmt::Display for CityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Three-decimal rendering with ties away from zero. `{:.3}` alone rounds
/// exact halves to even.
fn fixed3(value: f64) -> String {
    let magnitude = value.abs();
    let doubled = magnitude * 2000.0;
    let exact = magnitude.mul_add(2000.0, -doubled) == 0.0;
    let digits = if exact && doubled.fract() == 0.0 && doubled % 2.0 == 1.0 {
        format!("{:.3}", (doubled + 1.0) / 2000.0)
    } else {
        format!("{magnitude:.3}")
    };
    if value < 0.0 {
        format!("-{digits}")
    } else {
        digits
    }
}

/// What the user asked to add.
#[derive(Debug, Clone, PartialEq)]
pub enum CityQuery {
    Name(String),
    Coords { lat: f64, lon: f64 },
}

impl CityQuery {
    /// Key known before any fetch.
    ///
    /// Exact for coordinates. For names this is the lower-cased raw input,
    /// which only matches the canonical key when the API echoes the same name.
    pub fn provisional_key(&self) -> CityKey {
        match self {
            CityQuery::Name(name) => CityKey::from_name(name),
            CityQuery::Coords { lat, lon } => CityKey::from_coords(*lat, *lon),
        }
    }

    /// Parse user input: `@lat,lon` is a coordinate pair, anything else a name.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match CityKey::from_stored(trimmed).coordinates() {
            Some((lat, lon)) => CityQuery::Coords { lat, lon },
            None => CityQuery::Name(trimmed.to_string()),
        }
    }
}

impl std::fmt::Display for CityQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CityQuery::Name(name) => f.write_str(name),
            CityQuery::Coords { lat, lon } => write!(f, "{lat},{lon}"),
        }
    }
}

/// Weather condition categories mapped from OpenWeatherMap condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_id(id: u32) -> Self {
        match id {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            511 => Self::Sleet, // Freezing rain
            500 | 501 | 520 | 521 => Self::Rain,
            502..=504 | 522 | 531 => Self::HeavyRain,
            611..=616 => Self::Sleet,
            600..=699 => Self::Snow,
            700..=799 => Self::Fog,
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear, // Unknown ids default to clear
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    /// Short glyph used by the terminal renderer
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle | Self::Rain | Self::HeavyRain => "cloud_rain",
            Self::Snow | Self::Sleet => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

/// One entry of the `weather` array
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionInfo {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: f64,
    #[serde(default)]
    pub temp_min: f64,
    #[serde(default)]
    pub temp_max: f64,
    #[serde(default)]
    pub pressure: f64,
    #[serde(default)]
    pub humidity: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SysInfo {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
}

/// Current conditions as returned by `/weather` (metric units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub coord: Option<Coord>,
    #[serde(default)]
    pub weather: Vec<ConditionInfo>,
    pub main: MainReadings,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub dt: i64,
    #[serde(default)]
    pub sys: SysInfo,
    /// Shift in seconds from UTC
    #[serde(default)]
    pub timezone: i32,
    #[serde(default)]
    pub name: String,
}

impl CurrentWeather {
    pub fn primary_condition(&self) -> Option<&ConditionInfo> {
        self.weather.first()
    }

    pub fn condition(&self) -> WeatherCondition {
        self.primary_condition()
            .map(|c| WeatherCondition::from_owm_id(c.id))
            .unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.primary_condition()
            .map(|c| c.description.as_str())
            .unwrap_or("")
    }

    /// "London, GB" or just "London" when no country is reported
    pub fn display_name(&self) -> String {
        match self.sys.country.as_deref().filter(|c| !c.is_empty()) {
            Some(country) => format!("{}, {}", self.name, country),
            None => self.name.clone(),
        }
    }

    /// Canonical key for a name-based lookup: the API's name, lower-cased.
    pub fn canonical_name_key(&self) -> Option<CityKey> {
        let key = CityKey::from_name(&self.name);
        (!key.is_empty()).then_some(key)
    }
}

/// One 3-hourly entry of `/forecast`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub dt: i64,
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<ConditionInfo>,
}

impl ForecastPoint {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.dt, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastCity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: i32,
}

/// Response of `/forecast`: 5 days in 3-hour steps
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastPoint>,
    #[serde(default)]
    pub city: ForecastCity,
}

/// Reduced forecast for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// Short weekday label, e.g. "Tue"
    pub day: String,
    pub icon: String,
    pub description: String,
    pub condition: WeatherCondition,
    pub min: f64,
    pub max: f64,
}

/// Current conditions plus the derived day summaries for one city.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub key: CityKey,
    pub current: CurrentWeather,
    pub daily: Vec<DaySummary>,
}

/// Geocoding match offered while searching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySuggestion {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl CitySuggestion {
    /// "Portland, Oregon, US" or "Paris, FR"
    pub fn full_name(&self) -> String {
        match self.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => format!("{}, {}", self.name, self.country),
        }
    }
}
