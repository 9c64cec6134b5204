//! `DashMap` Cache - In-Process Cache Backend
//!
//! A concurrent `HashMap` with per-entry expiry. Used in development and
//! tests in place of Redis; it honours the same TTL contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::traits::{CacheBackend, CacheLookup};

/// Cache entry with expiration tracking
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Simple concurrent cache using `DashMap`
///
/// Expired entries are dropped lazily on read, or in bulk by
/// [`cleanup_expired`](Self::cleanup_expired).
///
/// **Example**:
/// ```rust
/// use asset_store::backends::DashMapCache;
/// use asset_store::CacheBackend;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), asset_store::CacheError> {
/// let cache = DashMapCache::new();
///
/// cache.set_with_ttl("favourites:u1", b"[]", Duration::from_secs(60)).await?;
/// assert!(cache.get("favourites:u1").await.is_hit());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DashMapCache {
    map: Arc<DashMap<String, CacheEntry>>,
}

impl DashMapCache {
    /// Create new `DashMap` cache
    #[must_use]
    pub fn new() -> Self {
        info!("Initializing DashMap Cache (concurrent HashMap)");

        Self {
            map: Arc::new(DashMap::new()),
        }
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[DashMap] Cleaned up expired entries");
        }
        removed
    }

    /// Time left before `key` expires, `None` if absent or already expired
    #[must_use]
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        self.map
            .get(key)
            .and_then(|entry| entry.expires_at.checked_duration_since(Instant::now()))
    }

    /// Get current cache size (expired entries included until cleaned up)
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for DashMapCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for DashMapCache {
    async fn get(&self, key: &str) -> CacheLookup {
        let Some(entry) = self.map.get(key) else {
            return CacheLookup::Miss;
        };

        if entry.is_expired() {
            drop(entry); // Release read lock before removing
            self.map.remove(key);
            debug!(key = %key, "[DashMap] Dropped expired key");
            return CacheLookup::Miss;
        }

        CacheLookup::Hit(entry.value.clone())
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.map
            .insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[DashMap] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.map.remove(key);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "DashMap"
    }
}
