//! Display formatting shared by renderers.

use chrono::{DateTime, FixedOffset};

use crate::types::TemperatureUnit;

/// Round half up, matching how the dashboard has always rounded readings.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Format a metric reading in the requested unit, e.g. `21°C` or `70°F`.
pub fn format_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Celsius => format!("{}°C", round_half_up(celsius)),
        TemperatureUnit::Fahrenheit => {
            format!("{}°F", round_half_up(celsius_to_fahrenheit(celsius)))
        }
    }
}

/// Format a forecast bound without a unit suffix, e.g. `21°`.
pub fn format_degrees(celsius: f64, unit: TemperatureUnit) -> String {
    let value = match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
    };
    format!("{}°", round_half_up(value))
}

/// Convert already-rendered text such as `"21°C"` to `unit`.
///
/// Returns `None` when the text is not a temperature. Text already in
/// `unit` is returned unchanged.
pub fn reformat_temperature_text(text: &str, unit: TemperatureUnit) -> Option<String> {
    let trimmed = text.trim();
    let (number, from) = if let Some(n) = trimmed.strip_suffix("°C") {
        (n, TemperatureUnit::Celsius)
    } else if let Some(n) = trimmed.strip_suffix("°F") {
        (n, TemperatureUnit::Fahrenheit)
    } else {
        return None;
    };
    let value: f64 = number.trim().parse().ok()?;

    if from == unit {
        return Some(trimmed.to_string());
    }

    let converted = match unit {
        TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(value),
        TemperatureUnit::Celsius => fahrenheit_to_celsius(value),
    };
    Some(format!("{}{}", round_half_up(converted), unit.symbol()))
}

/// Human readable age of an update timestamp (epoch millis).
pub fn time_since_update(updated_ms: Option<i64>, now_ms: i64) -> String {
    let Some(updated_ms) = updated_ms.filter(|ts| *ts > 0) else {
        return "Never updated".to_string();
    };

    let diff = (now_ms - updated_ms).max(0);
    let minutes = diff / (1000 * 60);
    let hours = diff / (1000 * 60 * 60);
    let days = diff / (1000 * 60 * 60 * 24);

    fn plural(n: i64, unit: &str) -> String {
        format!("{n} {unit}{} ago", if n == 1 { "" } else { "s" })
    }

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "min")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days < 7 {
        plural(days, "day")
    } else {
        plural(days / 7, "week")
    }
}

/// Local wall-clock `HH:MM` for an epoch-seconds instant and UTC offset.
pub fn format_clock(epoch_secs: i64, offset_secs: i32) -> Option<String> {
    let offset = FixedOffset::east_opt(offset_secs)?;
    let utc = DateTime::from_timestamp(epoch_secs, 0)?;
    Some(utc.with_timezone(&offset).format("%H:%M").to_string())
}
