//! Reduction of the 3-hourly forecast list to per-day summaries.

use chrono::{FixedOffset, NaiveDate, Offset, Timelike, Utc};

use crate::types::{DaySummary, ForecastPoint, WeatherCondition};

/// Number of future days shown on a card
pub const MAX_FORECAST_DAYS: usize = 3;

/// Local hours whose entry best represents a day's weather
const MIDDAY_HOURS: std::ops::RangeInclusive<u32> = 12..=14;

/// Group forecast points by UTC calendar date and summarize each day.
///
/// Points dated `today` are skipped. Only the first [`MAX_FORECAST_DAYS`]
/// distinct dates (in API order) are kept, but every point of a kept date
/// contributes to its min/max. The representative entry is picked by the
/// city's local hour, `utc_offset_secs` east of UTC.
pub fn daily_forecast(
    points: &[ForecastPoint],
    today: NaiveDate,
    utc_offset_secs: i32,
) -> Vec<DaySummary> {
    let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
    let mut groups: Vec<(NaiveDate, Vec<&ForecastPoint>)> = Vec::new();

    for point in points {
        let Some(timestamp) = point.timestamp() else {
            tracing::debug!("Skipping forecast entry with invalid timestamp {}", point.dt);
            continue;
        };
        let date = timestamp.date_naive();
        if date == today {
            continue;
        }

        if let Some((_, entries)) = groups.iter_mut().find(|(d, _)| *d == date) {
            entries.push(point);
        } else if groups.len() < MAX_FORECAST_DAYS {
            groups.push((date, vec![point]));
        }
    }

    groups
        .into_iter()
        .filter_map(|(date, entries)| summarize_day(date, &entries, offset))
        .collect()
}

fn summarize_day(
    date: NaiveDate,
    entries: &[&ForecastPoint],
    offset: FixedOffset,
) -> Option<DaySummary> {
    let representative = entries
        .iter()
        .find(|p| {
            p.timestamp()
                .is_some_and(|ts| MIDDAY_HOURS.contains(&ts.with_timezone(&offset).hour()))
        })
        .or_else(|| entries.first())?;

    let min = entries
        .iter()
        .map(|p| p.main.temp_min)
        .fold(f64::INFINITY, f64::min);
    let max = entries
        .iter()
        .map(|p| p.main.temp_max)
        .fold(f64::NEG_INFINITY, f64::max);

    let condition = representative.weather.first();

    Some(DaySummary {
        date,
        day: date.format("%a").to_string(),
        icon: condition.map(|c| c.icon.clone()).unwrap_or_default(),
        description: condition.map(|c| c.description.clone()).unwrap_or_default(),
        condition: condition
            .map(|c| WeatherCondition::from_owm_id(c.id))
            .unwrap_or_default(),
        min: min.min(max),
        max: max.max(min),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConditionInfo, MainReadings};
    use chrono::{TimeZone, Utc};

    fn point(y: i32, m: u32, d: u32, h: u32, min: f64, max: f64, icon: &str) -> ForecastPoint {
        ForecastPoint {
            dt: Utc
                .with_ymd_and_hms(y, m, d, h, 0, 0)
                .single()
                .map(|t| t.timestamp())
                .unwrap_or_default(),
            main: MainReadings {
                temp: (min + max) / 2.0,
                temp_min: min,
                temp_max: max,
                ..MainReadings::default()
            },
            weather: vec![ConditionInfo {
                id: 800,
                main: "Clear".into(),
                description: format!("sky {icon}"),
                icon: icon.into(),
            }],
        }
    }

    /// Five days in 3-hour steps starting at 2024-03-10 09:00 UTC
    fn five_day_list() -> Vec<ForecastPoint> {
        let mut list = Vec::new();
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        for step in 0..40 {
            let t = start + chrono::Duration::hours(3 * step);
            let base = step as f64;
            list.push(ForecastPoint {
                dt: t.timestamp(),
                main: MainReadings {
                    temp: base,
                    temp_min: base - 1.0,
                    temp_max: base + 1.0,
                    ..MainReadings::default()
                },
                weather: vec![ConditionInfo {
                    id: 500,
                    main: "Rain".into(),
                    description: "light rain".into(),
                    icon: format!("{:02}d", t.hour()),
                }],
            });
        }
        list
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_excludes_today_and_caps_at_three_days() {
        let days = daily_forecast(&five_day_list(), date(2024, 3, 10), 0);

        assert_eq!(days.len(), 3);
        assert_eq!(
            days.iter().map(|d| d.date).collect::<Vec<_>>(),
            vec![date(2024, 3, 11), date(2024, 3, 12), date(2024, 3, 13)]
        );
        assert!(days.iter().all(|d| d.max >= d.min));
    }

    #[test]
    fn test_min_max_cover_whole_day() {
        let days = daily_forecast(&five_day_list(), date(2024, 3, 10), 0);
        // 2024-03-11 spans steps 5..=12 (00:00..21:00)
        assert_eq!(days[0].min, 4.0);
        assert_eq!(days[0].max, 13.0);
        // The third kept day still aggregates all eight of its entries
        assert_eq!(days[2].min, 20.0);
        assert_eq!(days[2].max, 29.0);
    }

    #[test]
    fn test_midday_entry_is_representative() {
        let days = daily_forecast(&five_day_list(), date(2024, 3, 10), 0);
        assert_eq!(days[0].icon, "12d");
        assert_eq!(days[0].day, "Mon");
        assert_eq!(days[0].condition, WeatherCondition::Rain);
    }

    #[test]
    fn test_falls_back_to_first_entry_without_midday() {
        let list = vec![
            point(2024, 3, 11, 0, 3.0, 5.0, "01n"),
            point(2024, 3, 11, 6, 4.0, 8.0, "02d"),
            point(2024, 3, 11, 21, 2.0, 6.0, "03n"),
        ];
        let days = daily_forecast(&list, date(2024, 3, 10), 0);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].icon, "01n");
        assert_eq!(days[0].min, 2.0);
        assert_eq!(days[0].max, 8.0);
    }

    #[test]
    fn test_midday_uses_city_local_hour() {
        // 03:00 UTC is noon in Tokyo, 12:00 UTC is 21:00 there
        let list = vec![
            point(2024, 3, 11, 3, 8.0, 12.0, "tokyo-noon"),
            point(2024, 3, 11, 12, 6.0, 9.0, "tokyo-21h"),
        ];
        let days = daily_forecast(&list, date(2024, 3, 10), 9 * 3600);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].icon, "tokyo-noon");
        assert_eq!(days[0].date, date(2024, 3, 11));

        let days = daily_forecast(&list, date(2024, 3, 10), 0);
        assert_eq!(days[0].icon, "tokyo-21h");
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        let list = vec![
            point(2024, 3, 11, 3, 8.0, 12.0, "early"),
            point(2024, 3, 11, 12, 6.0, 9.0, "noon"),
        ];
        let days = daily_forecast(&list, date(2024, 3, 10), i32::MAX);
        assert_eq!(days[0].icon, "noon");
    }

    #[test]
    fn test_keeps_api_order() {
        let list = vec![
            point(2024, 3, 12, 12, 1.0, 2.0, "a"),
            point(2024, 3, 11, 12, 1.0, 2.0, "b"),
        ];
        let days = daily_forecast(&list, date(2024, 3, 10), 0);
        assert_eq!(days[0].date, date(2024, 3, 12));
        assert_eq!(days[1].date, date(2024, 3, 11));
    }

    #[test]
    fn test_only_today_yields_nothing() {
        let list = vec![
            point(2024, 3, 10, 12, 1.0, 2.0, "a"),
            point(2024, 3, 10, 15, 1.0, 2.0, "b"),
        ];
        assert!(daily_forecast(&list, date(2024, 3, 10), 0).is_empty());
        assert!(daily_forecast(&[], date(2024, 3, 10), 0).is_empty());
    }
}
