//! Key-value persistence for client-side state.
//!
//! Stores serialize their state into a `{"state": ..., "version": 0}`
//! envelope under a fixed key, so files written by one version of the tool
//! stay readable by the next.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Envelope version written by this crate.
pub const STATE_VERSION: u32 = 0;

/// Storage backend for serialized store state.
pub trait Persistence: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Shared handle to a persistence backend.
pub type SharedPersistence = Arc<dyn Persistence>;

/// Keeps values in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    /// Uses `dir` for state files. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Uses `$HOME/.ai-esti/state`.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(crate::utils::settings::state_dir()?))
    }

    /// Directory holding the state files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Persistence for FilePersistence {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read state file: {}", path.display()))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create state directory: {}", self.dir.display())
        })?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write state file: {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove state file: {}", path.display())),
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    state: &'a T,
    version: u32,
}

#[derive(Deserialize)]
struct Envelope<T> {
    state: T,
    #[serde(default)]
    version: u32,
}

/// Reads and unwraps the state stored under `key`.
///
/// Returns `Ok(None)` when nothing is stored or the envelope has a version
/// this crate does not write.
pub fn load_state<T: DeserializeOwned>(persistence: &dyn Persistence, key: &str) -> Result<Option<T>> {
    let Some(raw) = persistence.load(key)? else {
        return Ok(None);
    };
    let envelope: Envelope<T> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse persisted state for {key}"))?;
    if envelope.version != STATE_VERSION {
        warn!(key, version = envelope.version, "Ignoring persisted state with unknown version");
        return Ok(None);
    }
    debug!(key, "Loaded persisted state");
    Ok(Some(envelope.state))
}

/// Wraps `state` in the envelope and stores it under `key`.
pub fn save_state<T: Serialize>(persistence: &dyn Persistence, key: &str, state: &T) -> Result<()> {
    let json = serde_json::to_string(&EnvelopeRef {
        state,
        version: STATE_VERSION,
    })
    .with_context(|| format!("Failed to serialize state for {key}"))?;
    persistence.save(key, &json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    #[test]
    fn memory_round_trip_and_remove() {
        let store = MemoryPersistence::new();
        assert_eq!(store.load("k").unwrap(), None);
        store.save("k", "v").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.load("k").unwrap(), None);
    }

    #[test]
    fn file_persistence_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilePersistence::new(temp_dir.path().join("nested").join("state"));

        assert_eq!(store.load("ai-chat-storage").unwrap(), None);
        store.save("ai-chat-storage", "{}").unwrap();
        assert!(store.dir().join("ai-chat-storage.json").exists());
        assert_eq!(store.load("ai-chat-storage").unwrap().as_deref(), Some("{}"));

        store.remove("ai-chat-storage").unwrap();
        store.remove("ai-chat-storage").unwrap();
        assert_eq!(store.load("ai-chat-storage").unwrap(), None);
    }

    #[test]
    fn envelope_format() {
        let store = MemoryPersistence::new();
        save_state(&store, "counter", &Counter { count: 3 }).unwrap();
        assert_eq!(
            store.load("counter").unwrap().as_deref(),
            Some(r#"{"state":{"count":3},"version":0}"#)
        );
        assert_eq!(
            load_state::<Counter>(&store, "counter").unwrap(),
            Some(Counter { count: 3 })
        );
    }

    #[test]
    fn unknown_version_is_ignored() {
        let store = MemoryPersistence::new();
        store
            .save("counter", r#"{"state":{"count":3},"version":7}"#)
            .unwrap();
        assert_eq!(load_state::<Counter>(&store, "counter").unwrap(), None);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let store = MemoryPersistence::new();
        store.save("counter", "not json").unwrap();
        let err = load_state::<Counter>(&store, "counter").unwrap_err();
        assert!(err.to_string().contains("Failed to parse persisted state"));
    }
}
