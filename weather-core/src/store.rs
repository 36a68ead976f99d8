//! Persisted view state: a small key-value store for the last viewed city and
//! the last successful payloads.

use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::error::StoreError;

/// The fixed keys the coordinator reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    SelectedCity,
    WeatherPayload,
    ForecastPayload,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::SelectedCity => "selected_city",
            StorageKey::WeatherPayload => "weather_data",
            StorageKey::ForecastPayload => "forecast_data",
        }
    }
}

#[async_trait]
pub trait ViewStateStore: Send + Sync + Debug {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: StorageKey, value: String) -> Result<(), StoreError>;

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<StorageKey, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ViewStateStore for MemoryStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: String) -> Result<(), StoreError> {
        self.entries().insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        self.entries().remove(&key);
        Ok(())
    }
}

/// All keys kept as one JSON object in a single file, rewritten on each change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl ViewStateStore for JsonFileStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        let mut entries = self.load().await?;
        Ok(entries.remove(key.as_str()))
    }

    async fn set(&self, key: StorageKey, value: String) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.as_str().to_string(), value);
        self.save(&entries).await
    }

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key.as_str()).is_some() {
            self.save(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(StorageKey::SelectedCity).await.unwrap(), None);

        store.set(StorageKey::SelectedCity, "London, UK".into()).await.unwrap();
        assert_eq!(
            store.get(StorageKey::SelectedCity).await.unwrap().as_deref(),
            Some("London, UK")
        );

        store.remove(StorageKey::SelectedCity).await.unwrap();
        assert_eq!(store.get(StorageKey::SelectedCity).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));

        assert_eq!(store.get(StorageKey::WeatherPayload).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("view.json");

        let first = JsonFileStore::new(&path);
        first.set(StorageKey::SelectedCity, "Paris, France".into()).await.unwrap();
        first.set(StorageKey::ForecastPayload, "{\"days\":[]}".into()).await.unwrap();

        let second = JsonFileStore::new(&path);
        assert_eq!(
            second.get(StorageKey::SelectedCity).await.unwrap().as_deref(),
            Some("Paris, France")
        );
        assert_eq!(
            second.get(StorageKey::ForecastPayload).await.unwrap().as_deref(),
            Some("{\"days\":[]}")
        );

        second.remove(StorageKey::SelectedCity).await.unwrap();
        assert_eq!(first.get(StorageKey::SelectedCity).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        let err = store.get(StorageKey::SelectedCity).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
