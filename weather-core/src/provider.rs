use crate::{
    Config, Coordinates, ForecastSnapshot, GatewayError, Suggestion, WeatherSnapshot,
    provider::{google_places::GooglePlacesGateway, weatherapi::WeatherApiGateway},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod google_places;
pub mod weatherapi;

/// Remote services that need credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    WeatherApi,
    GooglePlaces,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::GooglePlaces => "googleplaces",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::WeatherApi, ProviderId::GooglePlaces]
    }

    /// Environment variables that override the configured key and base URL.
    pub fn env_vars(&self) -> (&'static str, &'static str) {
        match self {
            ProviderId::WeatherApi => ("WEATHERAPI_KEY", "WEATHERAPI_BASE_URL"),
            ProviderId::GooglePlaces => ("GOOGLE_PLACES_API_KEY", "GOOGLE_PLACES_BASE_URL"),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "googleplaces" | "google" | "places" => Ok(ProviderId::GooglePlaces),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: weatherapi, googleplaces."
            )),
        }
    }
}

/// Current conditions and forecasts.
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    async fn current_by_city(&self, name: &str) -> Result<WeatherSnapshot, GatewayError>;

    async fn current_by_coords(&self, at: Coordinates) -> Result<WeatherSnapshot, GatewayError>;

    async fn forecast(&self, at: Coordinates, days: u8) -> Result<ForecastSnapshot, GatewayError>;
}

/// Place autocomplete and place-id resolution.
#[async_trait]
pub trait PlaceGateway: Send + Sync + Debug {
    async fn autocomplete(&self, input: &str) -> Result<Vec<Suggestion>, GatewayError>;

    async fn resolve(&self, place_id: &str) -> Result<Coordinates, GatewayError>;
}

fn missing_key(id: ProviderId) -> anyhow::Error {
    let (key_var, _) = id.env_vars();
    anyhow::anyhow!(
        "No API key configured for provider '{id}'.\n\
             Hint: run `weather configure {id}` or set {key_var}."
    )
}

/// Construct the weather gateway from config.
pub fn weather_gateway_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherGateway>> {
    let id = ProviderId::WeatherApi;
    let api_key = config.provider_api_key(id).ok_or_else(|| missing_key(id))?;

    let gateway = match config.provider_base_url(id) {
        Some(base) => WeatherApiGateway::with_base_url(api_key.to_owned(), base.to_owned())?,
        None => WeatherApiGateway::new(api_key.to_owned())?,
    };

    Ok(Arc::new(gateway))
}

/// Construct the places gateway from config.
pub fn place_gateway_from_config(config: &Config) -> anyhow::Result<Arc<dyn PlaceGateway>> {
    let id = ProviderId::GooglePlaces;
    let api_key = config.provider_api_key(id).ok_or_else(|| missing_key(id))?;

    let gateway = match config.provider_base_url(id) {
        Some(base) => GooglePlacesGateway::with_base_url(api_key.to_owned(), base.to_owned())?,
        None => GooglePlacesGateway::new(api_key.to_owned())?,
    };

    Ok(Arc::new(gateway))
}

/// Cut long provider bodies down before they end up in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
