use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

use crate::{error::LocationError, model::Coordinates};

/// Outcome of a location permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Bounds for a one-shot position reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// Oldest cached fix the provider may hand back instead of a fresh one.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(15), maximum_age: Duration::from_secs(10) }
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn request_permission(&self) -> Permission;

    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinates, LocationError>;
}

/// One position reading, bounded by `options.timeout` whatever the provider does.
pub async fn acquire_position(
    provider: &dyn LocationProvider,
    options: PositionOptions,
) -> Result<Coordinates, LocationError> {
    match tokio::time::timeout(options.timeout, provider.current_position(options)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

/// Fixed coordinates from configuration standing in for device geolocation.
///
/// Permission is granted only when coordinates are configured.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    position: Option<Coordinates>,
}

impl ConfiguredLocation {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for ConfiguredLocation {
    async fn request_permission(&self) -> Permission {
        match self.position {
            Some(_) => Permission::Granted,
            None => Permission::Denied,
        }
    }

    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        match self.position {
            Some(p) if p.is_valid() => Ok(p),
            Some(p) => Err(LocationError::Unavailable(format!(
                "configured coordinates {} are out of range",
                p.as_query()
            ))),
            None => Err(LocationError::Unavailable("no location configured".into())),
        }
    }
}
