//! Plain-text rendering of the coordinator's read model.

use chrono::Timelike;
use std::fmt::Write;
use weather_core::{CoordinatorState, ForecastSnapshot, WeatherSnapshot};

/// Everything the screen would show, as terminal text.
pub fn report(state: &CoordinatorState) -> String {
    let mut out = String::new();

    match &state.weather {
        Some(weather) => current(&mut out, weather),
        None if state.weather_error.is_none() => {
            out.push_str("Nothing to show yet. Try `weather search <city>`.\n");
        }
        None => {}
    }

    if let Some(forecast) = &state.forecast {
        let from_hour = state.weather.as_ref().map(|w| w.location.local_time.hour());
        today(&mut out, forecast, from_hour);
        daily(&mut out, forecast);
    }

    if let Some(e) = &state.weather_error {
        let _ = writeln!(out, "\nWeather error: {e}");
    }
    if let Some(e) = &state.forecast_error {
        let _ = writeln!(out, "\nForecast error: {e}");
    }

    out
}

fn current(out: &mut String, weather: &WeatherSnapshot) {
    let loc = &weather.location;
    let now = &weather.current;

    let place = [loc.name.as_str(), loc.region.as_str(), loc.country.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let _ = writeln!(out, "{place}");
    let _ = writeln!(out, "Local time: {}", loc.local_time.format("%a %d %b %H:%M"));
    let _ = writeln!(
        out,
        "{}°C  {}  (feels like {}°C)",
        now.temperature_c, now.condition.text, now.feels_like_c
    );
    let _ = writeln!(out, "Wind {} km/h  Humidity {}%", now.wind_kph, now.humidity_pct);
}

/// Remaining hours of the first forecast day.
fn today(out: &mut String, forecast: &ForecastSnapshot, from_hour: Option<u32>) {
    let from_hour = from_hour.unwrap_or(0);
    let hours: Vec<_> = forecast
        .today_hours()
        .iter()
        .filter(|h| h.time.hour() >= from_hour)
        .collect();

    if hours.is_empty() {
        return;
    }

    out.push_str("\nToday\n");
    for h in hours {
        let hour = h.time.hour();
        let _ = writeln!(out, "  {hour:>2}:00  {:>3}°C  {}", h.temp_c, h.condition.text);
    }
}

fn daily(out: &mut String, forecast: &ForecastSnapshot) {
    if forecast.days.is_empty() {
        return;
    }

    let _ = writeln!(out, "\n{}-day forecast", forecast.days.len());
    for day in &forecast.days {
        let _ = writeln!(
            out,
            "  {}  {:>3}° / {:>3}°  {}",
            day.date.format("%a %d %b"),
            day.max_temp_c,
            day.min_temp_c,
            day.condition.text
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use weather_core::{Condition, CurrentConditions, DayForecast, HourForecast, LocationInfo};

    fn cond(text: &str) -> Condition {
        Condition { text: text.into(), icon: String::new() }
    }

    fn state() -> CoordinatorState {
        let day = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        CoordinatorState {
            weather: Some(WeatherSnapshot {
                location: LocationInfo {
                    name: "London".into(),
                    region: String::new(),
                    country: "United Kingdom".into(),
                    lat: 51.52,
                    lon: -0.11,
                    local_time: day.and_hms_opt(13, 5, 0).unwrap(),
                },
                current: CurrentConditions {
                    temperature_c: 15,
                    condition: cond("Partly cloudy"),
                    wind_kph: 10,
                    humidity_pct: 75,
                    feels_like_c: 14,
                },
            }),
            forecast: Some(ForecastSnapshot {
                days: vec![DayForecast {
                    date: day,
                    max_temp_c: 17,
                    min_temp_c: 8,
                    condition: cond("Sunny"),
                    hours: (12..15)
                        .map(|h| HourForecast {
                            time: day.and_hms_opt(h, 0, 0).unwrap(),
                            temp_c: 10 + h as i32,
                            condition: cond("Clear"),
                        })
                        .collect(),
                }],
            }),
            ..CoordinatorState::default()
        }
    }

    #[test]
    fn report_shows_current_hours_and_days() {
        let text = report(&state());

        assert!(text.starts_with("London, United Kingdom\n"));
        assert!(text.contains("Local time: Wed 20 Mar 13:05"));
        assert!(text.contains("15°C  Partly cloudy  (feels like 14°C)"));
        assert!(text.contains("Wind 10 km/h  Humidity 75%"));
        // Hours before the local time are skipped.
        assert!(!text.contains("12:00"));
        assert!(text.contains("13:00"));
        assert!(text.contains("14:00"));
        assert!(text.contains("1-day forecast"));
        assert!(text.contains("Wed 20 Mar   17° /   8°  Sunny"));
    }

    #[test]
    fn report_lists_errors_and_keeps_snapshot() {
        let mut s = state();
        s.weather_error = Some("city not found".into());

        let text = report(&s);

        assert!(text.contains("London, United Kingdom"));
        assert!(text.contains("Weather error: city not found"));
    }

    #[test]
    fn empty_state_hints_at_search() {
        let text = report(&CoordinatorState::default());
        assert!(text.contains("weather search"));
    }
}
