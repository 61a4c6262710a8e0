//! Cache port consulted by the batch dispatcher before providers.
//!
//! The core only defines and calls this contract; real storage lives
//! outside. Every error a cache produces is read as a miss downstream —
//! a broken cache must never fail a query. `MemoryCache` is the bundled
//! process-local implementation used by the server and the tests.

use super::types::Address;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Cache-side failure. Dispatcher policy: treated as a miss.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheError(pub String);

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache failure: {}", self.0)
    }
}

impl std::error::Error for CacheError {}

/// Key/value contract keyed by the stable strings from
/// `GeocodeQuery::cache_key`. Implementations are shared across batch
/// items, hence the `Send + Sync` bound.
pub trait Cache: Send + Sync {
    fn has(&self, key: &str) -> Result<bool, CacheError>;
    fn get(&self, key: &str) -> Result<Option<Address>, CacheError>;
    fn set(&self, key: &str, address: &Address) -> Result<(), CacheError>;
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// ─── MemoryCache ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    address: Address,
    stored_at_ms: i64,
}

/// In-memory cache with an optional TTL. Entries at or past the TTL read
/// as misses.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl_ms: Option<i64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: None,
        }
    }

    /// A cache whose entries expire `ttl_ms` milliseconds after storage.
    pub fn with_ttl_ms(ttl_ms: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: Some(ttl_ms),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expired(&self, entry: &CacheEntry) -> bool {
        match self.ttl_ms {
            Some(ttl) => Utc::now().timestamp_millis() - entry.stored_at_ms >= ttl,
            None => false,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn has(&self, key: &str) -> Result<bool, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CacheError("cache mutex poisoned".into()))?;
        Ok(entries.get(key).is_some_and(|e| !self.expired(e)))
    }

    fn get(&self, key: &str) -> Result<Option<Address>, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CacheError("cache mutex poisoned".into()))?;
        Ok(entries
            .get(key)
            .filter(|e| !self.expired(e))
            .map(|e| e.address.clone()))
    }

    fn set(&self, key: &str, address: &Address) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError("cache mutex poisoned".into()))?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                address: address.clone(),
                stored_at_ms: Utc::now().timestamp_millis(),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError("cache mutex poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}
