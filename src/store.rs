//! Durable key/value store for client-side state
//!
//! Everything the pipeline persists (registry, checkpoints, skip policy,
//! comment cache, history) goes through [`KeyValueStore`]. Values are JSON
//! strings. Both implementations enforce an optional byte quota so callers
//! can exercise their quota-recovery paths.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded ({used} of {quota} bytes)")]
    QuotaExceeded { used: usize, quota: usize },

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not encode value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Minimal string key/value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// Shared handle passed to every component
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read and decode a JSON value; malformed entries read as absent
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding malformed stored value");
            None
        }
    }
}

/// Encode and write a JSON value
pub fn set_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Remove every key starting with `prefix`; returns how many were removed
pub fn purge_prefix(store: &dyn KeyValueStore, prefix: &str) -> usize {
    let doomed: Vec<String> = store
        .keys()
        .into_iter()
        .filter(|k| k.starts_with(prefix))
        .collect();
    for key in &doomed {
        store.remove(key);
    }
    doomed.len()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn map_size(map: &BTreeMap<String, String>) -> usize {
    map.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Bytes the map would occupy after writing `key = value`
fn size_after_write(map: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let current = map_size(map);
    let replaced = map.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    current - replaced + key.len() + value.len()
}

// =============================================================================
// In-memory store
// =============================================================================

/// Volatile store, used by tests and as a fallback when disk is unavailable
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once `quota` bytes would be exceeded
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(quota),
        }
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        if let Some(quota) = self.quota {
            let used = size_after_write(&entries, key, value);
            if used > quota {
                return Err(StoreError::QuotaExceeded { used, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        lock(&self.entries).remove(key);
    }

    fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// JSON map on disk, written through on every mutation
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    quota: usize,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`
    ///
    /// An unreadable or corrupt file starts an empty store rather than failing.
    pub fn open(path: impl Into<PathBuf>, quota: usize) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "store file is corrupt, starting empty");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            path,
            entries: Mutex::new(entries),
            quota,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file each write goes through before it replaces the store
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Write the whole map to a staging file, then rename it over the store
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string(entries)?;
        let staging = self.staging_path();
        std::fs::write(&staging, body)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        let used = size_after_write(&entries, key, value);
        if used > self.quota {
            return Err(StoreError::QuotaExceeded {
                used,
                quota: self.quota,
            });
        }
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&entries) {
            // Keep memory and disk in agreement
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            if let Err(e) = self.flush(&entries) {
                warn!(key, error = %e, "failed to persist removal");
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }
}
