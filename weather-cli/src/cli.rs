use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use std::{sync::Arc, time::Duration};
use weather_core::{
    Config, ConfiguredLocation, Coordinates, CoordinatorSettings, GatewayError, JsonFileStore,
    Notice, PlaceGateway, ProviderId, Suggestion, WeatherCoordinator,
    provider::{place_gateway_from_config, weather_gateway_from_config},
};

use crate::render;

/// Upper bound on waiting for autocomplete results in `find`.
const SUGGESTION_WAIT: Duration = Duration::from_secs(15);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, "weatherapi" or "googleplaces".
        provider: String,
    },

    /// Show weather for a city name.
    Search {
        /// City name, e.g. "London" or "New York".
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },

    /// Look up places matching some text and pick one.
    Find {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show weather for the configured home location.
    Here,

    /// Re-fetch weather for the last shown place.
    Refresh,

    /// Show the last shown place, refreshed.
    Show,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            command => drive(command).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_file()?;

    if config.is_provider_configured(id) {
        println!("Provider '{id}' already has a key; entering a new one replaces it.");
    }

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.upsert_provider_api_key(id, api_key);
    config.save()?;

    println!("Saved key for '{id}' to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Restore the persisted screen, run one trigger and print the result.
async fn drive(command: Command) -> anyhow::Result<()> {
    let config = Config::load()?;
    let coordinator = build_coordinator(&config, &command)?;
    let mut notices = coordinator.notices();

    coordinator.restore().await;

    match command {
        Command::Search { city } => {
            coordinator.set_search_text(city.join(" "));
            coordinator.search().await;
        }
        Command::Find { text } => {
            let text = text.join(" ");
            let suggestions = suggestions_for(&coordinator, &text).await;
            if suggestions.is_empty() {
                println!("No places match '{text}'.");
                return Ok(());
            }

            let picked = pick_suggestion(suggestions)?;
            coordinator.select_suggestion(picked).await;
        }
        Command::Here => {
            if config.home_coordinates().is_none() {
                println!(
                    "No location configured. Add a [location] table to {}",
                    Config::config_file_path()?.display()
                );
            }
            coordinator.request_location().await;
        }
        Command::Refresh => coordinator.refresh().await,
        Command::Show | Command::Configure { .. } => {}
    }

    while let Ok(Notice::SelectionFailed { message }) = notices.try_recv() {
        eprintln!("{message}");
    }

    print!("{}", render::report(&coordinator.state()));
    Ok(())
}

fn build_coordinator(config: &Config, command: &Command) -> anyhow::Result<WeatherCoordinator> {
    let weather = weather_gateway_from_config(config)?;
    let needs_places = matches!(command, Command::Find { .. });

    let places: Arc<dyn PlaceGateway> = match place_gateway_from_config(config) {
        Ok(places) => places,
        Err(e) if needs_places => return Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "places provider not configured");
            Arc::new(MissingPlaces { reason: e.to_string() })
        }
    };

    let store = JsonFileStore::new(config.state_file_path()?);
    let location = ConfiguredLocation::new(config.home_coordinates());

    Ok(WeatherCoordinator::new(
        weather,
        places,
        Arc::new(store),
        Arc::new(location),
        settings_for(command),
    ))
}

fn settings_for(command: &Command) -> CoordinatorSettings {
    CoordinatorSettings {
        // `here` locates on its own; restore must not do it a second time.
        locate_on_start: !matches!(command, Command::Here),
        ..CoordinatorSettings::default()
    }
}

/// Type the text and wait for the debounced autocomplete to settle.
async fn suggestions_for(coordinator: &WeatherCoordinator, text: &str) -> Vec<Suggestion> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut rx = coordinator.subscribe();
    coordinator.set_search_text(text);

    let answered = async {
        rx.wait_for(|s| s.suggestion_input == text && !s.suggestions_loading)
            .await
            .map(|s| s.suggestions.clone())
    };

    match tokio::time::timeout(SUGGESTION_WAIT, answered).await {
        Ok(Ok(list)) => list,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "state channel closed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("timed out waiting for place suggestions");
            Vec::new()
        }
    }
}

fn pick_suggestion(suggestions: Vec<Suggestion>) -> anyhow::Result<Suggestion> {
    let labels: Vec<String> = suggestions.iter().map(|s| s.description.clone()).collect();

    let choice = Select::new("Pick a place:", labels)
        .raw_prompt()
        .context("No place selected")?;

    suggestions
        .into_iter()
        .nth(choice.index)
        .context("Selected place is no longer available")
}

/// Stands in for the places provider when no key is configured.
#[derive(Debug)]
struct MissingPlaces {
    reason: String,
}

#[async_trait]
impl PlaceGateway for MissingPlaces {
    async fn autocomplete(&self, _input: &str) -> Result<Vec<Suggestion>, GatewayError> {
        Err(GatewayError::provider(self.reason.clone()))
    }

    async fn resolve(&self, _place_id: &str) -> Result<Coordinates, GatewayError> {
        Err(GatewayError::provider(self.reason.clone()))
    }
}
