//! Read-cache backend trait and in-memory implementation
//!
//! Entries are keyed by `(namespace, key)` where the namespace is a
//! collection name and the key a request fingerprint. Invalidation on
//! mutation is a coarse per-namespace sweep: false invalidation is
//! acceptable, serving stale values is not.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use warden_core::{StoreError, WardenError, WardenResult};

/// Cache backend contract: keyed get/set/delete with expiry plus a
/// namespace-wide invalidation sweep.
pub trait CacheBackend: Send + Sync {
    /// Get a cached value. Expired entries are a miss.
    fn get(&self, namespace: &str, key: &str) -> WardenResult<Option<Value>>;

    /// Store a value with a time-to-live.
    fn set(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> WardenResult<()>;

    /// Remove a single entry.
    fn delete(&self, namespace: &str, key: &str) -> WardenResult<()>;

    /// Remove every entry in a namespace, returning the count removed.
    fn invalidate_namespace(&self, namespace: &str) -> WardenResult<u64>;
}

fn poisoned() -> WardenError {
    WardenError::Store(StoreError::Connection {
        reason: "cache lock poisoned".to_string(),
    })
}

#[derive(Debug)]
struct CacheEntry {
    value: Value,
    deadline: Instant,
}

/// In-memory cache with per-entry deadlines.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|map| map.values().filter(|e| e.deadline > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> WardenResult<Option<Value>> {
        let map = self.entries.read().map_err(|_| poisoned())?;
        let entry = map.get(&(namespace.to_string(), key.to_string()));
        Ok(entry
            .filter(|e| e.deadline > Instant::now())
            .map(|e| e.value.clone()))
    }

    fn set(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> WardenResult<()> {
        let mut map = self.entries.write().map_err(|_| poisoned())?;
        map.insert(
            (namespace.to_string(), key.to_string()),
            CacheEntry {
                value,
                deadline: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> WardenResult<()> {
        let mut map = self.entries.write().map_err(|_| poisoned())?;
        map.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    fn invalidate_namespace(&self, namespace: &str) -> WardenResult<u64> {
        let mut map = self.entries.write().map_err(|_| poisoned())?;
        let before = map.len();
        map.retain(|(ns, _), _| ns != namespace);
        Ok((before - map.len()) as u64)
    }
}
