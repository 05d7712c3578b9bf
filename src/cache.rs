//! In-memory TTL cache keyed by string.
//!
//! Same `DashMap`-per-key shape as [`crate::credential::CredentialPool`]; expiry is
//! lazy, checked on `get` rather than swept by a background task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

struct CacheEntry {
    value: Arc<Value>,
    expires_at: Instant,
}

/// Keyed cache with per-entry expiry, used by the upstream dispatcher to avoid
/// re-fetching identical upstream responses within a service's configured TTL.
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached value for `key` if present and not yet expired. Removes the
    /// entry on expiry rather than leaving it to a sweep.
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        let hit = self.entries.get(key)?;
        if hit.expires_at <= Instant::now() {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.value.clone())
    }

    pub fn put(&self, key: String, value: Arc<Value>, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stores_and_retrieves() {
        let cache = TtlCache::new();
        cache.put(
            "k".to_string(),
            Arc::new(json!({"a": 1})),
            Duration::from_secs(60),
        );
        assert_eq!(*cache.get("k").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn expires_after_ttl() {
        let cache = TtlCache::new();
        cache.put(
            "k".to_string(),
            Arc::new(json!(1)),
            Duration::from_millis(0),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn missing_key_is_none() {
        let cache = TtlCache::new();
        assert!(cache.get("missing").is_none());
    }
}
