//! Core library for the `weather` app.
//!
//! This crate defines:
//! - The weather state coordinator that drives one weather screen
//! - Gateways to the weather and places providers
//! - Persisted view state and the location provider abstraction
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but any front end can drive the coordinator
//! and render its [`CoordinatorState`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod store;

pub use config::{Config, LocationConfig, ProviderConfig};
pub use coordinator::{CoordinatorSettings, CoordinatorState, Notice, WeatherCoordinator};
pub use error::{GatewayError, LocationError, StoreError};
pub use location::{ConfiguredLocation, LocationProvider, Permission, PositionOptions};
pub use model::{
    Condition, Coordinates, CurrentConditions, DayForecast, ForecastSnapshot, HourForecast,
    LocationInfo, Suggestion, WeatherSnapshot,
};
pub use provider::{PlaceGateway, ProviderId, WeatherGateway};
pub use store::{JsonFileStore, MemoryStore, StorageKey, ViewStateStore};
