//! TTL cache service over the key/value store
//!
//! Entries are stamped with their write time and treated as absent once older
//! than the TTL (lazy expiry, nothing sweeps in the background). A write the
//! store rejects for quota reasons purges this cache's prefix and retries once.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::store::{self, SharedStore, StoreError};

/// Stored envelope: the value plus when it was cached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamped<T> {
    /// Unix millis
    pub cached_at: u64,
    pub value: T,
}

/// Current time as unix millis
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Namespaced cache with lazy TTL expiry
#[derive(Clone)]
pub struct TtlCache {
    store: SharedStore,
    prefix: String,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(store: SharedStore, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Live value for `key`, if any
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, now_millis())
    }

    /// Same as [`get`](Self::get) with an explicit clock reading
    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now: u64) -> Option<T> {
        let stamped: Stamped<T> = store::get_json(self.store.as_ref(), &self.full_key(key))?;
        let age = now.saturating_sub(stamped.cached_at);
        if u128::from(age) > self.ttl.as_millis() {
            debug!(key, age_ms = age, "cache entry expired");
            return None;
        }
        Some(stamped.value)
    }

    /// Cache `value` under `key`
    pub fn put<T: Serialize>(&self, key: &str, value: T) -> Result<(), StoreError> {
        self.put_at(key, value, now_millis())
    }

    pub fn put_at<T: Serialize>(&self, key: &str, value: T, now: u64) -> Result<(), StoreError> {
        let full_key = self.full_key(key);
        let stamped = Stamped {
            cached_at: now,
            value,
        };
        match store::set_json(self.store.as_ref(), &full_key, &stamped) {
            Err(StoreError::QuotaExceeded { used, quota }) => {
                let purged = store::purge_prefix(self.store.as_ref(), &self.prefix);
                warn!(
                    prefix = %self.prefix,
                    purged,
                    used,
                    quota,
                    "store quota exceeded, purged cache and retrying"
                );
                store::set_json(self.store.as_ref(), &full_key, &stamped)
            }
            other => other,
        }
    }

    pub fn evict(&self, key: &str) {
        self.store.remove(&self.full_key(key));
    }

    /// Drop every entry in this cache's namespace
    pub fn clear(&self) -> usize {
        store::purge_prefix(self.store.as_ref(), &self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn test_get_within_ttl() {
        let cache = TtlCache::new(MemoryStore::shared(), "c_", Duration::from_secs(60));
        cache.put_at("k", 7u32, 1_000).unwrap();
        assert_eq!(cache.get_at::<u32>("k", 1_000 + 60_000), Some(7));
        assert_eq!(cache.get_at::<u32>("k", 1_000 + 60_001), None);
    }

    #[test]
    fn test_evict_and_clear() {
        let store = MemoryStore::shared();
        store.set("other", "1").unwrap();
        let cache = TtlCache::new(store.clone(), "c_", Duration::from_secs(60));
        cache.put("a", 1u8).unwrap();
        cache.put("b", 2u8).unwrap();
        cache.evict("a");
        assert_eq!(cache.get::<u8>("a"), None);
        assert_eq!(cache.clear(), 1);
        assert_eq!(store.keys(), vec!["other".to_string()]);
    }

    #[test]
    fn test_quota_purges_prefix_then_retries() {
        let store: SharedStore = Arc::new(MemoryStore::with_quota(120));
        store.set("keep", "x").unwrap();
        let cache = TtlCache::new(store.clone(), "c_", Duration::from_secs(60));
        cache.put("old", "a".repeat(40)).unwrap();
        // Does not fit next to "old", fits once the prefix is purged
        cache.put("new", "b".repeat(60)).unwrap();
        assert!(cache.get::<String>("old").is_none());
        assert_eq!(cache.get::<String>("new"), Some("b".repeat(60)));
        assert_eq!(store.get("keep").as_deref(), Some("x"));
    }

    #[test]
    fn test_quota_retry_gives_up_when_still_too_big() {
        let store: SharedStore = Arc::new(MemoryStore::with_quota(20));
        let cache = TtlCache::new(store, "c_", Duration::from_secs(60));
        assert!(cache.put("huge", "z".repeat(100)).is_err());
    }
}
