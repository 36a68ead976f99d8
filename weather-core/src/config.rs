use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::{model::Coordinates, provider::ProviderId};

/// Credentials and endpoint for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's public endpoint (handy for proxies and tests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Fixed position used when the user asks for "weather here".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [providers.weatherapi]
    /// api_key = "..."
    ///
    /// [providers.googleplaces]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationConfig>,

    /// Where the persisted view state lives; defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Config {
    /// Load the config file and apply environment overrides on top.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Load config from disk only, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted view state file.
    pub fn state_file_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("view_state.json")),
        }
    }

    /// Override keys and endpoints from the environment, e.g. `WEATHERAPI_KEY`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for id in ProviderId::all() {
            let (key_var, url_var) = id.env_vars();

            if let Some(key) = lookup(key_var).filter(|k| !k.trim().is_empty()) {
                self.providers
                    .entry(id.as_str().to_string())
                    .and_modify(|p| p.api_key = key.clone())
                    .or_insert(ProviderConfig { api_key: key, base_url: None });
            }

            if let Some(url) = lookup(url_var).filter(|u| !u.trim().is_empty()) {
                if let Some(p) = self.providers.get_mut(id.as_str()) {
                    p.base_url = Some(url);
                }
            }
        }
    }

    /// Set or replace a provider API key, keeping any custom base URL.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|p| p.api_key = api_key.clone())
            .or_insert(ProviderConfig { api_key, base_url: None });
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    pub fn provider_base_url(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).and_then(|cfg| cfg.base_url.as_deref())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    pub fn set_location(&mut self, at: Coordinates) {
        self.location = Some(LocationConfig { latitude: at.lat, longitude: at.lon });
    }

    pub fn home_coordinates(&self) -> Option<Coordinates> {
        self.location.map(|l| Coordinates::new(l.latitude, l.longitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn empty_config_has_no_providers() {
        let cfg = Config::default();
        assert!(!cfg.is_provider_configured(ProviderId::WeatherApi));
        assert!(cfg.home_coordinates().is_none());
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WEATHER_KEY".into());

        assert_eq!(cfg.provider_api_key(ProviderId::WeatherApi), Some("WEATHER_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::WeatherApi));
        assert!(!cfg.is_provider_configured(ProviderId::GooglePlaces));
    }

    #[test]
    fn upsert_keeps_custom_base_url() {
        let mut cfg = Config::from_toml(
            r#"
            [providers.weatherapi]
            api_key = "OLD"
            base_url = "http://localhost:9000/v1"
            "#,
        )
        .expect("valid toml");

        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "NEW".into());

        assert_eq!(cfg.provider_api_key(ProviderId::WeatherApi), Some("NEW"));
        assert_eq!(cfg.provider_base_url(ProviderId::WeatherApi), Some("http://localhost:9000/v1"));
    }

    #[test]
    fn parses_location_table() {
        let cfg = Config::from_toml(
            r#"
            [location]
            latitude = 51.52
            longitude = -0.11
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.home_coordinates(), Some(Coordinates::new(51.52, -0.11)));
    }

    #[test]
    fn env_overrides_key_and_base_url() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|name| match name {
            "WEATHERAPI_KEY" => Some("ENV_KEY".into()),
            "WEATHERAPI_BASE_URL" => Some("http://proxy/v1".into()),
            "GOOGLE_PLACES_BASE_URL" => Some("http://ignored".into()),
            _ => None,
        });

        assert_eq!(cfg.provider_api_key(ProviderId::WeatherApi), Some("ENV_KEY"));
        assert_eq!(cfg.provider_base_url(ProviderId::WeatherApi), Some("http://proxy/v1"));
        // A base URL alone does not configure a provider.
        assert!(!cfg.is_provider_configured(ProviderId::GooglePlaces));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::GooglePlaces, "FILE_KEY".into());
        cfg.apply_env_overrides(|_| Some("  ".into()));

        assert_eq!(cfg.provider_api_key(ProviderId::GooglePlaces), Some("FILE_KEY"));
    }

    #[test]
    fn explicit_state_file_wins() {
        let cfg = Config { state_file: Some(PathBuf::from("/tmp/view.json")), ..Config::default() };
        assert_eq!(cfg.state_file_path().unwrap(), PathBuf::from("/tmp/view.json"));
    }

    #[test]
    fn toml_roundtrip_omits_empty_sections() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "K".into());
        let text = toml::to_string_pretty(&cfg).unwrap();

        assert!(!text.contains("location"));
        assert!(!text.contains("base_url"));
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.provider_api_key(ProviderId::WeatherApi), Some("K"));
    }
}
