use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A point on the globe, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within the usual latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Query form understood by the weather provider, e.g. `51.52,-0.11`.
    pub fn as_query(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

/// One autocomplete entry from the places provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Opaque provider identifier, unique within one response.
    pub place_id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    /// Icon reference as handed out by the provider (usually a CDN path).
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub local_time: NaiveDateTime,
}

impl LocationInfo {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: i32,
    pub condition: Condition,
    pub wind_kph: i32,
    pub humidity_pct: u8,
    pub feels_like_c: i32,
}

/// Current conditions for one place. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: LocationInfo,
    pub current: CurrentConditions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourForecast {
    pub time: NaiveDateTime,
    pub temp_c: i32,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub max_temp_c: i32,
    pub min_temp_c: i32,
    pub condition: Condition,
    pub hours: Vec<HourForecast>,
}

/// Multi-day forecast, in the order the provider returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ForecastSnapshot {
    pub days: Vec<DayForecast>,
}

impl ForecastSnapshot {
    /// Hourly entries of the first day, which is what the "today" strip shows.
    pub fn today_hours(&self) -> &[HourForecast] {
        self.days.first().map(|d| d.hours.as_slice()).unwrap_or(&[])
    }
}

/// The only normalization applied to provider numbers. Halves round up,
/// so -2.5 becomes -2.
pub(crate) fn round_to_int(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}
