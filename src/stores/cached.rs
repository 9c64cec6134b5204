//! Cached Store - Cache-Aside Decorator
//!
//! Wraps one [`AssetStore`] and one [`CacheBackend`]. Only the favourites
//! list is cached; asset reads and adds pass straight through.
//!
//! # Flow
//!
//! ```text
//! get_favourites → cache (favourites:<user>) → Hit + decodes → return
//!                                            ↓ Miss / Error / undecodable
//!                                            inner store → write back (TTL) → return
//!
//! remove / edit_description / add_favourite / remove_favourite
//!     → inner store → Ok(true)? → delete favourites:<user>
//! ```
//!
//! Description edits and asset removals invalidate too: the cached list
//! embeds full asset payloads.
//!
//! Cache failures are logged and counted, never returned. During an outage
//! reads go to the inner store and a failed invalidation leaves the entry
//! stale until its TTL runs out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::model::{Asset, AssetKind, Favourite};
use crate::traits::{AssetStore, CacheBackend, CacheLookup};

/// Default lifetime of a cached favourites list (5 minutes)
pub const FAVOURITES_TTL: Duration = Duration::from_secs(300);

/// Cache key holding `user_id`'s favourites
#[must_use]
pub fn favourites_cache_key(user_id: &str) -> String {
    format!("favourites:{user_id}")
}

/// Cached form of a [`Favourite`]: the variant tag next to the untagged payload
#[derive(Debug, Serialize, Deserialize)]
struct CachedFavourite {
    user_id: String,
    asset_type: AssetKind,
    asset_data: serde_json::Value,
}

/// Fails on a non-finite chart value, which JSON would turn into an undecodable `null`
fn encode_favourites(favourites: &[Favourite]) -> serde_json::Result<Vec<u8>> {
    let records = favourites
        .iter()
        .map(|favourite| {
            let non_finite = match &favourite.asset {
                Asset::Chart(chart) => chart.data.iter().any(|point| !point.value.is_finite()),
                _ => false,
            };
            if non_finite {
                return Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                    "chart {} has a non-finite data point",
                    favourite.asset.id()
                )));
            }
            Ok(CachedFavourite {
                user_id: favourite.user_id.clone(),
                asset_type: favourite.asset.kind(),
                asset_data: favourite.asset.data_json()?,
            })
        })
        .collect::<serde_json::Result<Vec<_>>>()?;
    serde_json::to_vec(&records)
}

/// Any record that fails to decode rejects the whole entry
fn decode_favourites(bytes: &[u8]) -> serde_json::Result<Vec<Favourite>> {
    let records: Vec<CachedFavourite> = serde_json::from_slice(bytes)?;
    records
        .into_iter()
        .map(|record| {
            Asset::from_data(record.asset_type, record.asset_data)
                .map(|asset| Favourite::new(record.user_id, asset))
        })
        .collect()
}

/// Cache-aside decorator over any [`AssetStore`]
pub struct CachedStore {
    inner: Arc<dyn AssetStore>,
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    decode_failures: AtomicU64,
    cache_errors: AtomicU64,
    invalidations: AtomicU64,
}

impl CachedStore {
    /// Wrap `inner`, caching favourites in `cache` for [`FAVOURITES_TTL`]
    pub fn new(inner: Arc<dyn AssetStore>, cache: Arc<dyn CacheBackend>) -> Self {
        info!(
            store = inner.name(),
            cache = cache.name(),
            "Initializing cache-aside store for favourites"
        );

        Self {
            inner,
            cache,
            ttl: FAVOURITES_TTL,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            cache_errors: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Override the favourites TTL
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The wrapped store
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn AssetStore> {
        &self.inner
    }

    /// Get cache statistics
    #[allow(clippy::cast_precision_loss)]
    pub fn get_stats(&self) -> CachedStoreStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let decode_failures = self.decode_failures.load(Ordering::Relaxed);
        let cache_errors = self.cache_errors.load(Ordering::Relaxed);
        let lookups = hits + misses + decode_failures;

        CachedStoreStats {
            hits,
            misses,
            decode_failures,
            cache_errors,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            hit_rate: if lookups > 0 {
                (hits as f64 / lookups as f64) * 100.0
            } else {
                0.0
            },
        }
    }

    /// Drop the cached favourites of `user_id`; failures are only logged
    async fn invalidate(&self, user_id: &str) {
        let key = favourites_cache_key(user_id);
        match self.cache.remove(&key).await {
            Ok(()) => {
                self.invalidations.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "[CachedStore] Invalidated favourites");
            }
            Err(err) => {
                self.cache_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %err, "[CachedStore] Failed to invalidate favourites, entry may stay stale until TTL");
            }
        }
    }

    async fn write_back(&self, key: &str, favourites: &[Favourite]) {
        let bytes = match encode_favourites(favourites) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "[CachedStore] Favourites not cacheable, serving uncached");
                return;
            }
        };

        if let Err(err) = self.cache.set_with_ttl(key, &bytes, self.ttl).await {
            self.cache_errors.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, error = %err, "[CachedStore] Failed to cache favourites");
        }
    }
}

#[async_trait]
impl AssetStore for CachedStore {
    async fn get(&self, user_id: &str) -> StoreResult<Vec<Asset>> {
        self.inner.get(user_id).await
    }

    async fn add(&self, user_id: &str, asset: Asset) -> StoreResult<()> {
        self.inner.add(user_id, asset).await
    }

    async fn remove(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        let removed = self.inner.remove(user_id, asset_id).await?;
        if removed {
            self.invalidate(user_id).await;
        }
        Ok(removed)
    }

    async fn edit_description(
        &self,
        user_id: &str,
        asset_id: &str,
        description: &str,
    ) -> StoreResult<bool> {
        let edited = self
            .inner
            .edit_description(user_id, asset_id, description)
            .await?;
        if edited {
            self.invalidate(user_id).await;
        }
        Ok(edited)
    }

    async fn get_favourites(&self, user_id: &str) -> StoreResult<Vec<Favourite>> {
        let key = favourites_cache_key(user_id);

        match self.cache.get(&key).await {
            CacheLookup::Hit(bytes) => match decode_favourites(&bytes) {
                Ok(favourites) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, count = favourites.len(), "[CachedStore] Cache hit");
                    return Ok(favourites);
                }
                Err(err) => {
                    self.decode_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %err, "[CachedStore] Cached favourites failed to decode, reloading");
                }
            },
            CacheLookup::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "[CachedStore] Cache miss");
            }
            CacheLookup::Error(err) => {
                self.cache_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %err, "[CachedStore] Cache read failed, falling back to store");
            }
        }

        let favourites = self.inner.get_favourites(user_id).await?;
        self.write_back(&key, &favourites).await;
        Ok(favourites)
    }

    async fn add_favourite(
        &self,
        user_id: &str,
        asset_id: &str,
        kind: AssetKind,
    ) -> StoreResult<bool> {
        let added = self.inner.add_favourite(user_id, asset_id, kind).await?;
        if added {
            self.invalidate(user_id).await;
        }
        Ok(added)
    }

    async fn remove_favourite(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        let removed = self.inner.remove_favourite(user_id, asset_id).await?;
        if removed {
            self.invalidate(user_id).await;
        }
        Ok(removed)
    }

    async fn health_check(&self) -> bool {
        let store_ok = self.inner.health_check().await;
        if !self.cache.health_check().await {
            warn!(cache = self.cache.name(), "[CachedStore] Cache unhealthy, serving favourites from store");
        }
        store_ok
    }

    fn name(&self) -> &'static str {
        "Cached"
    }
}

/// Cached store statistics
#[derive(Debug, Clone)]
pub struct CachedStoreStats {
    /// Favourites served from cache
    pub hits: u64,
    pub misses: u64,
    /// Entries present but undecodable
    pub decode_failures: u64,
    /// Failed cache reads, writes and invalidations
    pub cache_errors: u64,
    pub invalidations: u64,
    /// Hits as a percentage of lookups that reached the cache
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chart, ChartDataPoint, Insight};
    use serde_json::json;

    fn sample() -> Vec<Favourite> {
        vec![
            Favourite::new(
                "u1",
                Asset::from(Chart {
                    id: "c1".into(),
                    title: "Sales".into(),
                    data: vec![ChartDataPoint::new("q1", 1.5), ChartDataPoint::new("q2", 2.0)],
                    ..Chart::default()
                }),
            ),
            Favourite::new(
                "u1",
                Asset::from(Insight {
                    id: "i1".into(),
                    description: "up".into(),
                }),
            ),
        ]
    }

    #[test]
    fn key_is_prefixed_user_id() {
        assert_eq!(favourites_cache_key("42"), "favourites:42");
    }

    #[test]
    fn encoded_records_carry_tag_next_to_untagged_payload() {
        let bytes = encode_favourites(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            value[1],
            json!({
                "user_id": "u1",
                "asset_type": "insight",
                "asset_data": {"id": "i1", "description": "up"}
            })
        );
        assert_eq!(value[0]["asset_type"], "chart");
        assert!(value[0]["asset_data"].get("type").is_none());
    }

    #[test]
    fn decode_restores_concrete_variants() {
        let favourites = sample();
        let decoded = decode_favourites(&encode_favourites(&favourites).unwrap()).unwrap();
        assert_eq!(decoded, favourites);
    }

    #[test]
    fn encode_refuses_non_finite_chart_values() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let favourites = vec![Favourite::new(
                "u1",
                Asset::from(Chart {
                    id: "c1".into(),
                    data: vec![ChartDataPoint::new("q1", value)],
                    ..Chart::default()
                }),
            )];
            assert!(encode_favourites(&favourites).is_err());
        }
    }

    #[test]
    fn decode_rejects_whole_entry_on_one_bad_record() {
        let bytes = serde_json::to_vec(&json!([
            {"user_id": "u1", "asset_type": "insight", "asset_data": {"id": "i1"}},
            {"user_id": "u1", "asset_type": "audience", "asset_data": {"id": "a1", "purchases": "many"}}
        ]))
        .unwrap();
        assert!(decode_favourites(&bytes).is_err());

        assert!(decode_favourites(b"not json").is_err());
        assert!(decode_favourites(br#"[{"user_id":"u1","asset_type":"report","asset_data":{}}]"#).is_err());
    }
}
