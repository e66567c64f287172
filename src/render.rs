//! Terminal card renderer.
//!
//! Observes [`RenderEvent`]s and prints cards and notifications. Keeps its own
//! copy of what is on screen and never touches controller state.

use std::io::{self, Write};
use std::sync::mpsc::Receiver;

use atmos_weather::format::{
    format_clock, format_degrees, format_temperature, reformat_temperature_text, time_since_update,
};
use atmos_weather::{CityKey, RenderEvent, TemperatureUnit, WeatherSnapshot};
use chrono::Utc;

const RULE_WIDTH: usize = 44;

struct Card {
    snapshot: WeatherSnapshot,
    last_updated: Option<i64>,
    /// Headline temperature as last printed, e.g. `21°C`
    temperature: String,
    feels_like: String,
}

pub struct TerminalRenderer<W: Write> {
    out: W,
    cards: Vec<Card>,
    unit: TemperatureUnit,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            cards: Vec::new(),
            unit: TemperatureUnit::default(),
        }
    }

    /// Render events until every sender is gone.
    pub fn run(mut self, events: Receiver<RenderEvent>) {
        for event in events {
            if let Err(e) = self.handle(&event, Utc::now().timestamp_millis()) {
                tracing::warn!("Renderer output failed: {}", e);
                break;
            }
        }
    }

    pub fn handle(&mut self, event: &RenderEvent, now_ms: i64) -> io::Result<()> {
        match event {
            RenderEvent::Render {
                snapshot,
                unit,
                last_updated,
            } => {
                self.unit = *unit;
                let card = Card {
                    temperature: format_temperature(snapshot.current.main.temp, *unit),
                    feels_like: format_temperature(snapshot.current.main.feels_like, *unit),
                    snapshot: snapshot.clone(),
                    last_updated: *last_updated,
                };
                let index = match self.position(&snapshot.key) {
                    Some(i) => {
                        self.cards[i] = card;
                        i
                    }
                    None => {
                        self.cards.push(card);
                        self.cards.len() - 1
                    }
                };
                self.draw_card(index, now_ms)?;
            }
            RenderEvent::Remove { key } => {
                if let Some(i) = self.position(key) {
                    let card = self.cards.remove(i);
                    writeln!(self.out, "Removed {}", card.snapshot.current.display_name())?;
                }
            }
            RenderEvent::BecameEmpty => {
                writeln!(
                    self.out,
                    "No cities yet. Try 'add London' or 'here' to get started."
                )?;
            }
            RenderEvent::Cleared => {
                self.cards.clear();
                writeln!(self.out, "All cities cleared")?;
            }
            RenderEvent::Reformat { unit } => {
                self.unit = *unit;
                for card in &mut self.cards {
                    card.temperature = reformat_temperature_text(&card.temperature, *unit)
                        .unwrap_or_else(|| format_temperature(card.snapshot.current.main.temp, *unit));
                    card.feels_like = reformat_temperature_text(&card.feels_like, *unit)
                        .unwrap_or_else(|| {
                            format_temperature(card.snapshot.current.main.feels_like, *unit)
                        });
                }
                writeln!(self.out, "Showing temperatures in {}", unit.symbol())?;
                for card in &self.cards {
                    writeln!(
                        self.out,
                        "  {:<24} {:>6}  feels like {}",
                        card.snapshot.current.display_name(),
                        card.temperature,
                        card.feels_like
                    )?;
                }
            }
            RenderEvent::Duplicate { .. } => {
                writeln!(self.out, "City already displayed")?;
            }
            RenderEvent::Failed {
                key,
                message,
                detail,
            } => {
                tracing::debug!("Failure shown for {:?}: {}", key, detail);
                match key {
                    Some(key) => writeln!(self.out, "! {}: {}", key, message)?,
                    None => writeln!(self.out, "! {}", message)?,
                }
            }
        }
        self.out.flush()
    }

    fn position(&self, key: &CityKey) -> Option<usize> {
        self.cards.iter().position(|c| &c.snapshot.key == key)
    }

    fn draw_card(&mut self, index: usize, now_ms: i64) -> io::Result<()> {
        let unit = self.unit;
        let card = &self.cards[index];
        let current = &card.snapshot.current;

        let title = current.display_name();
        let fill = RULE_WIDTH.saturating_sub(title.chars().count() + 4);
        writeln!(self.out, "── {} {}", title, "─".repeat(fill))?;

        let description = match current.description() {
            "" => current.condition().description().to_string(),
            d => capitalize(d),
        };
        writeln!(self.out, "  {}  [{}]", description, current.condition().icon_name())?;
        writeln!(
            self.out,
            "  {}   feels like {}",
            card.temperature, card.feels_like
        )?;
        writeln!(
            self.out,
            "  Humidity {}%   Wind {} m/s   Pressure {} hPa",
            current.main.humidity,
            current.wind.speed.round(),
            current.main.pressure.round()
        )?;

        if let (Some(rise), Some(set)) = (current.sys.sunrise, current.sys.sunset) {
            if let (Some(rise), Some(set)) = (
                format_clock(rise, current.timezone),
                format_clock(set, current.timezone),
            ) {
                writeln!(self.out, "  Sunrise {}   Sunset {}", rise, set)?;
            }
        }

        if !card.snapshot.daily.is_empty() {
            let days: Vec<String> = card
                .snapshot
                .daily
                .iter()
                .map(|d| {
                    format!(
                        "{} {}/{} {}",
                        d.day,
                        format_degrees(d.min, unit),
                        format_degrees(d.max, unit),
                        d.condition.icon_name()
                    )
                })
                .collect();
            writeln!(self.out, "  {}", days.join("   "))?;
        }

        writeln!(
            self.out,
            "  Updated {}",
            time_since_update(card.last_updated, now_ms)
        )
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_weather::{ConditionInfo, CurrentWeather, DaySummary, MainReadings, SysInfo, WeatherCondition};
    use chrono::NaiveDate;

    fn snapshot(key: &str, name: &str, temp: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            key: CityKey::from_stored(key),
            current: CurrentWeather {
                coord: None,
                weather: vec![ConditionInfo {
                    id: 800,
                    main: "Clear".into(),
                    description: "clear sky".into(),
                    icon: "01d".into(),
                }],
                main: MainReadings {
                    temp,
                    feels_like: temp - 1.0,
                    pressure: 1013.0,
                    humidity: 40,
                    ..MainReadings::default()
                },
                wind: Default::default(),
                dt: 0,
                sys: SysInfo {
                    country: Some("GB".into()),
                    sunrise: Some(0),
                    sunset: Some(3600 * 12),
                },
                timezone: 0,
                name: name.into(),
            },
            daily: vec![DaySummary {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                day: "Tue".into(),
                icon: "10d".into(),
                description: "light rain".into(),
                condition: WeatherCondition::Rain,
                min: 4.0,
                max: 9.0,
            }],
        }
    }

    fn render(snapshot: WeatherSnapshot, unit: TemperatureUnit, now_ms: i64) -> RenderEvent {
        RenderEvent::Render {
            snapshot,
            unit,
            last_updated: Some(now_ms),
        }
    }

    fn output(renderer: &TerminalRenderer<Vec<u8>>) -> String {
        String::from_utf8_lossy(&renderer.out).into_owned()
    }

    #[test]
    fn test_card_contents() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer
            .handle(&render(snapshot("london", "London", 21.4), TemperatureUnit::Celsius, 1_000), 1_000)
            .unwrap();

        let text = output(&renderer);
        assert!(text.contains("London, GB"));
        assert!(text.contains("Clear sky"));
        assert!(text.contains("21°C"));
        assert!(text.contains("feels like 20°C"));
        assert!(text.contains("Humidity 40%"));
        assert!(text.contains("Sunrise 00:00   Sunset 12:00"));
        assert!(text.contains("Tue 4°/9°"));
        assert!(text.contains("Updated Just now"));
    }

    #[test]
    fn test_render_replaces_existing_card() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let unit = TemperatureUnit::Celsius;
        renderer.handle(&render(snapshot("paris", "Paris", 10.0), unit, 0), 0).unwrap();
        renderer.handle(&render(snapshot("paris", "Paris", 12.0), unit, 0), 0).unwrap();
        assert_eq!(renderer.cards.len(), 1);
        assert_eq!(renderer.cards[0].temperature, "12°C");
    }

    #[test]
    fn test_reformat_converts_printed_temperatures() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer
            .handle(&render(snapshot("paris", "Paris", 21.0), TemperatureUnit::Celsius, 0), 0)
            .unwrap();
        renderer
            .handle(
                &RenderEvent::Reformat {
                    unit: TemperatureUnit::Fahrenheit,
                },
                0,
            )
            .unwrap();

        assert_eq!(renderer.cards[0].temperature, "70°F");
        assert!(output(&renderer).contains("Showing temperatures in °F"));
    }

    #[test]
    fn test_unit_toggle_round_trip_keeps_cards_within_one_degree() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let temps = [-17.8, -0.4, 0.5, 12.3, 21.0, 36.6];
        for (i, temp) in temps.iter().enumerate() {
            let key = format!("city{i}");
            renderer
                .handle(&render(snapshot(&key, &key, *temp), TemperatureUnit::Celsius, 0), 0)
                .unwrap();
        }
        let before: Vec<(String, String)> = renderer
            .cards
            .iter()
            .map(|c| (c.temperature.clone(), c.feels_like.clone()))
            .collect();

        for unit in [TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius] {
            renderer.handle(&RenderEvent::Reformat { unit }, 0).unwrap();
        }

        let degrees = |text: &str| -> i64 { text.trim_end_matches("°C").parse().unwrap() };
        for (card, (temp, feels)) in renderer.cards.iter().zip(&before) {
            assert!(card.temperature.ends_with("°C"), "{}", card.temperature);
            assert!((degrees(&card.temperature) - degrees(temp)).abs() <= 1);
            assert!((degrees(&card.feels_like) - degrees(feels)).abs() <= 1);
        }
        assert_eq!(renderer.unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let unit = TemperatureUnit::Celsius;
        renderer.handle(&render(snapshot("paris", "Paris", 10.0), unit, 0), 0).unwrap();
        renderer.handle(&render(snapshot("oslo", "Oslo", 1.0), unit, 0), 0).unwrap();

        renderer
            .handle(&RenderEvent::Remove { key: CityKey::from_stored("paris") }, 0)
            .unwrap();
        assert_eq!(renderer.cards.len(), 1);
        assert!(output(&renderer).contains("Removed Paris, GB"));

        renderer.handle(&RenderEvent::Cleared, 0).unwrap();
        renderer.handle(&RenderEvent::BecameEmpty, 0).unwrap();
        assert!(renderer.cards.is_empty());
        assert!(output(&renderer).contains("No cities yet"));
    }

    #[test]
    fn test_failure_notification() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer
            .handle(
                &RenderEvent::Failed {
                    key: Some(CityKey::from_stored("atlantis")),
                    message: "Failed to fetch weather data",
                    detail: "HTTP 404: city not found".into(),
                },
                0,
            )
            .unwrap();
        assert!(output(&renderer).contains("! atlantis: Failed to fetch weather data"));
    }
}
