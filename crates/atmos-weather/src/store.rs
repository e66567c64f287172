//! Durable snapshot of the tracked city list.
//!
//! The whole state is one JSON blob stored under a single namespace key.
//! Loading never fails outward and saving is best-effort: persistence is a
//! convenience for the next session, not a correctness requirement of this one.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use atmos_core::StorageError;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::CityKey;

/// Namespace key the state is stored under
pub const STORAGE_NAMESPACE: &str = "atmos:weather-data";

/// Minimal key/value storage, the shape of browser local storage.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One JSON file per namespace key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `atmos:weather-data` -> `<dir>/atmos-weather-data.json`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Malformed(format!("{}: {}", path.display(), e))),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", self.dir.display(), e)))?;

        // Write to a sibling temp file first so a crash never leaves half a snapshot
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

/// In-memory backend; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: impl Into<String>) {
        self.entries.lock().insert(key.to_string(), value.into());
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.insert(key, value);
        Ok(())
    }
}

/// Serialized form of the dashboard state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub cities: Vec<CityKey>,
    pub use_celsius: bool,
    /// Epoch millis of the last successful fetch per key
    pub last_updated: BTreeMap<CityKey, i64>,
    /// Epoch millis of the save
    pub timestamp: i64,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            cities: Vec::new(),
            use_celsius: true,
            last_updated: BTreeMap::new(),
            timestamp: 0,
        }
    }
}

impl PersistedState {
    /// Lenient decode: each field falls back to its default on its own.
    ///
    /// `now_ms` is stamped on saved cities that have no timestamp yet.
    fn from_json(raw: &str, now_ms: i64) -> Result<Self, StorageError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| StorageError::Malformed(e.to_string()))?;
        let Value::Object(obj) = value else {
            return Err(StorageError::Malformed("expected a JSON object".to_string()));
        };

        let mut cities: Vec<CityKey> = Vec::new();
        if let Some(Value::Array(items)) = obj.get("cities") {
            for key in items.iter().filter_map(Value::as_str) {
                let key = CityKey::from_stored(key);
                if !key.is_empty() && !cities.contains(&key) {
                    cities.push(key);
                }
            }
        }

        let use_celsius = !matches!(obj.get("useCelsius"), Some(Value::Bool(false)));

        let mut last_updated: BTreeMap<CityKey, i64> = BTreeMap::new();
        if let Some(Value::Object(stamps)) = obj.get("lastUpdated") {
            for (key, ts) in stamps {
                if let Some(ts) = ts.as_i64().or_else(|| ts.as_f64().map(|f| f as i64)) {
                    last_updated.insert(CityKey::from_stored(key.as_str()), ts);
                }
            }
        }
        for key in &cities {
            last_updated
                .entry(key.clone())
                .and_modify(|ts| {
                    if *ts <= 0 {
                        *ts = now_ms;
                    }
                })
                .or_insert(now_ms);
        }

        let timestamp = obj.get("timestamp").and_then(Value::as_i64).unwrap_or(0);

        Ok(Self {
            cities,
            use_celsius,
            last_updated,
            timestamp,
        })
    }
}

/// Load/save boundary for [`PersistedState`]. Holds no copy of the state.
pub struct PersistedCityStore {
    backend: Box<dyn StorageBackend>,
    namespace: String,
}

impl PersistedCityStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            namespace: STORAGE_NAMESPACE.to_string(),
        }
    }

    /// Store backed by a JSON file in `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(dir))
    }

    /// Load the saved state, falling back to defaults on absent or malformed data
    pub fn load(&self) -> PersistedState {
        let raw = match self.backend.read(&self.namespace) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("No saved cities under {}", self.namespace);
                return PersistedState::default();
            }
            Err(e) => {
                tracing::warn!("Failed to load saved data: {}", e);
                return PersistedState::default();
            }
        };

        match PersistedState::from_json(&raw, Utc::now().timestamp_millis()) {
            Ok(state) => {
                tracing::info!("Loaded {} saved cities", state.cities.len());
                state
            }
            Err(e) => {
                tracing::warn!("Failed to load saved data: {}", e);
                PersistedState::default()
            }
        }
    }

    /// Save the state, stamping `timestamp`. Errors are returned, not logged.
    pub fn try_save(&self, state: &PersistedState) -> Result<(), StorageError> {
        let mut snapshot = state.clone();
        snapshot.timestamp = Utc::now().timestamp_millis();
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.backend.write(&self.namespace, &json)
    }

    /// Best-effort save: failures are logged and swallowed.
    pub fn save(&self, state: &PersistedState) {
        if let Err(e) = self.try_save(state) {
            tracing::warn!("Failed to save data: {}", e);
        }
    }
}

impl std::fmt::Debug for PersistedCityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedCityStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FullBackend;

    impl StorageBackend for FullBackend {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteFailed("quota exceeded".into()))
        }
    }

    fn key(s: &str) -> CityKey {
        CityKey::from_stored(s)
    }

    #[test]
    fn test_absent_data_yields_defaults() {
        let store = PersistedCityStore::new(MemoryBackend::new());
        let state = store.load();
        assert!(state.cities.is_empty());
        assert!(state.use_celsius);
        assert!(state.last_updated.is_empty());
    }

    #[test]
    fn test_malformed_data_yields_defaults() {
        let backend = MemoryBackend::new();
        backend.insert(STORAGE_NAMESPACE, "{not json");
        let store = PersistedCityStore::new(backend.clone());
        assert_eq!(store.load(), PersistedState::default());

        backend.insert(STORAGE_NAMESPACE, "[1, 2, 3]");
        assert_eq!(store.load(), PersistedState::default());
    }

    #[test]
    fn test_save_then_load() {
        let backend = MemoryBackend::new();
        let store = PersistedCityStore::new(backend.clone());

        let mut state = PersistedState {
            cities: vec![key("london"), key("@51.507,-0.128")],
            use_celsius: false,
            ..PersistedState::default()
        };
        state.last_updated.insert(key("london"), 1_000);
        state.last_updated.insert(key("@51.507,-0.128"), 2_000);
        store.save(&state);

        let raw = backend.get(STORAGE_NAMESPACE).unwrap();
        let json: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["cities"][0], "london");
        assert_eq!(json["useCelsius"], false);
        assert_eq!(json["lastUpdated"]["london"], 1_000);
        assert!(json["timestamp"].as_i64().unwrap() > 0);

        let loaded = store.load();
        assert_eq!(loaded.cities, state.cities);
        assert!(!loaded.use_celsius);
        assert_eq!(loaded.last_updated, state.last_updated);
    }

    #[test]
    fn test_lenient_fields() {
        let backend = MemoryBackend::new();
        backend.insert(
            STORAGE_NAMESPACE,
            r#"{"cities": ["paris", 7, "paris", "", "tokyo"], "useCelsius": "yes", "lastUpdated": {"paris": 5}}"#,
        );
        let state = PersistedCityStore::new(backend).load();

        assert_eq!(state.cities, vec![key("paris"), key("tokyo")]);
        assert!(state.use_celsius);
        assert_eq!(state.last_updated.get(&key("paris")), Some(&5));
        // Missing timestamps are filled in at load time
        assert!(state.last_updated.get(&key("tokyo")).is_some_and(|ts| *ts > 0));
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let store = PersistedCityStore::new(FullBackend);
        store.save(&PersistedState::default());
        assert!(store.try_save(&PersistedState::default()).is_err());
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistedCityStore::in_dir(dir.path().join("nested"));

        let state = PersistedState {
            cities: vec![key("dubai")],
            ..PersistedState::default()
        };
        store.save(&state);

        let backend = FileBackend::new(dir.path().join("nested"));
        let path = backend.path_for(STORAGE_NAMESPACE);
        assert!(path.ends_with("atmos-weather-data.json"));
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        assert_eq!(store.load().cities, vec![key("dubai")]);
    }
}
