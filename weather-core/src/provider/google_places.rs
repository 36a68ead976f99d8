use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

use crate::{
    error::GatewayError,
    model::{Coordinates, Suggestion},
    provider::truncate_body,
};

use super::PlaceGateway;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Google Places (legacy web service) client.
#[derive(Debug, Clone)]
pub struct GooglePlacesGateway {
    api_key: String,
    base_url: String,
    http: Client,
}

impl GooglePlacesGateway {
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
        tracing::debug!(%url, ?query, "Places request");

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to reach Places API: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to read Places response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GpStatus>(&body)
                .ok()
                .and_then(|s| s.error_message)
                .unwrap_or_else(|| {
                    format!(
                        "Places request failed with status {}: {}",
                        status,
                        truncate_body(&body)
                    )
                });
            return Err(GatewayError::provider(message));
        }

        // Google answers most failures with 200 and a non-OK status field.
        let envelope: GpStatus = serde_json::from_str(&body)
            .map_err(|_| GatewayError::provider("Invalid response from Places API"))?;
        if !matches!(envelope.status.as_str(), "OK" | "ZERO_RESULTS") {
            return Err(GatewayError::provider(
                envelope.error_message.unwrap_or(envelope.status),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|_| GatewayError::provider("Invalid response from Places API"))
    }
}

#[async_trait]
impl PlaceGateway for GooglePlacesGateway {
    async fn autocomplete(&self, input: &str) -> Result<Vec<Suggestion>, GatewayError> {
        let parsed: GpAutocompleteResponse =
            self.get_json("place/autocomplete/json", &[("input", input)]).await?;

        Ok(parsed
            .predictions
            .into_iter()
            .map(|p| Suggestion { place_id: p.place_id, description: p.description })
            .collect())
    }

    async fn resolve(&self, place_id: &str) -> Result<Coordinates, GatewayError> {
        let parsed: GpDetailsResponse = self
            .get_json("place/details/json", &[("place_id", place_id), ("fields", "geometry")])
            .await?;

        parsed
            .result
            .and_then(|r| r.geometry)
            .map(|g| Coordinates::new(g.location.lat, g.location.lng))
            .ok_or_else(|| GatewayError::provider("Invalid response from Places API"))
    }
}

#[derive(Debug, Deserialize)]
struct GpStatus {
    #[serde(default)]
    status: String,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GpPrediction {
    place_id: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct GpAutocompleteResponse {
    #[serde(default)]
    predictions: Vec<GpPrediction>,
}

#[derive(Debug, Deserialize)]
struct GpLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct GpGeometry {
    location: GpLatLng,
}

#[derive(Debug, Deserialize)]
struct GpDetailsResult {
    geometry: Option<GpGeometry>,
}

#[derive(Debug, Deserialize)]
struct GpDetailsResponse {
    result: Option<GpDetailsResult>,
}
