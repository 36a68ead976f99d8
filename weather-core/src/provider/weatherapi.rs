use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

use crate::{
    error::GatewayError,
    model::{
        Condition, Coordinates, CurrentConditions, DayForecast, ForecastSnapshot, HourForecast,
        LocationInfo, WeatherSnapshot, round_to_int,
    },
    provider::truncate_body,
};

use super::WeatherGateway;

pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// WeatherAPI.com client.
#[derive(Debug, Clone)]
pub struct WeatherApiGateway {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiGateway {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}/{endpoint}", self.base_url);
        tracing::debug!(%url, ?query, "WeatherAPI request");

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to reach WeatherAPI.com: {e}")))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            GatewayError::network(format!("Failed to read WeatherAPI response: {e}"))
        })?;

        if !status.is_success() {
            // The provider reports failures as {"error": {"code": .., "message": ..}}.
            let message = serde_json::from_str::<WaErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| {
                    format!(
                        "WeatherAPI request failed with status {}: {}",
                        status,
                        truncate_body(&body)
                    )
                });
            return Err(GatewayError::provider(message));
        }

        serde_json::from_str(&body).map_err(|e| {
            GatewayError::provider(format!("Failed to parse WeatherAPI {endpoint} JSON: {e}"))
        })
    }

    async fn fetch_current(&self, q: &str) -> Result<WeatherSnapshot, GatewayError> {
        let parsed: WaCurrentResponse = self.get_json("current.json", &[("q", q)]).await?;
        parsed.into_snapshot()
    }
}

#[async_trait]
impl WeatherGateway for WeatherApiGateway {
    async fn current_by_city(&self, name: &str) -> Result<WeatherSnapshot, GatewayError> {
        self.fetch_current(name).await
    }

    async fn current_by_coords(&self, at: Coordinates) -> Result<WeatherSnapshot, GatewayError> {
        self.fetch_current(&at.as_query()).await
    }

    async fn forecast(&self, at: Coordinates, days: u8) -> Result<ForecastSnapshot, GatewayError> {
        let q = at.as_query();
        let days = days.to_string();
        let parsed: WaForecastResponse = self
            .get_json(
                "forecast.json",
                &[("q", q.as_str()), ("days", days.as_str()), ("aqi", "no"), ("alerts", "no")],
            )
            .await?;

        let days = parsed
            .forecast
            .forecastday
            .into_iter()
            .map(WaForecastDay::into_day)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ForecastSnapshot { days })
    }
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorBody,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    region: String,
    country: String,
    lat: f64,
    lon: f64,
    localtime: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    icon: String,
}

impl From<WaCondition> for Condition {
    fn from(c: WaCondition) -> Self {
        Condition { text: c.text, icon: c.icon }
    }
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: f64,
    wind_kph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    location: WaLocation,
    current: WaCurrent,
}

impl WaCurrentResponse {
    fn into_snapshot(self) -> Result<WeatherSnapshot, GatewayError> {
        let local_time = parse_local_time(&self.location.localtime)?;

        Ok(WeatherSnapshot {
            location: LocationInfo {
                name: self.location.name,
                region: self.location.region,
                country: self.location.country,
                lat: self.location.lat,
                lon: self.location.lon,
                local_time,
            },
            current: CurrentConditions {
                temperature_c: round_to_int(self.current.temp_c),
                condition: self.current.condition.into(),
                wind_kph: round_to_int(self.current.wind_kph),
                humidity_pct: self.current.humidity.round().clamp(0.0, 100.0) as u8,
                feels_like_c: round_to_int(self.current.feelslike_c),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaHour {
    time: String,
    temp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: String,
    day: WaDay,
    hour: Vec<WaHour>,
}

impl WaForecastDay {
    fn into_day(self) -> Result<DayForecast, GatewayError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|e| {
            GatewayError::provider(format!("Invalid forecast date '{}': {e}", self.date))
        })?;

        let hours = self
            .hour
            .into_iter()
            .map(|h| {
                Ok(HourForecast {
                    time: parse_local_time(&h.time)?,
                    temp_c: round_to_int(h.temp_c),
                    condition: h.condition.into(),
                })
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;

        Ok(DayForecast {
            date,
            max_temp_c: round_to_int(self.day.maxtemp_c),
            min_temp_c: round_to_int(self.day.mintemp_c),
            condition: self.day.condition.into(),
            hours,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

fn parse_local_time(raw: &str) -> Result<NaiveDateTime, GatewayError> {
    NaiveDateTime::parse_from_str(raw, LOCAL_TIME_FORMAT)
        .map_err(|e| GatewayError::provider(format!("Invalid provider time '{raw}': {e}")))
}
