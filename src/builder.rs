//! Asset System Builder
//!
//! Assembles an [`AssetSystem`] from a [`StoreConfig`] or from injected parts.
//!
//! # Example: Configured From The Environment
//!
//! ```rust,no_run
//! use asset_store::{AssetStoreBuilder, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let system = AssetStoreBuilder::new()
//!         .with_config(StoreConfig::from_env()?)
//!         .build()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Custom Store And Cache
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use asset_store::{AssetStoreBuilder, DashMapCache, MemoryStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let system = AssetStoreBuilder::new()
//!     .with_store(Arc::new(MemoryStore::new()))
//!     .with_cache(Arc::new(DashMapCache::new()))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::AssetSystem;
use crate::config::{StoreBackend, StoreConfig};
use crate::stores::{CachedStore, MemoryStore, SqlStore};
use crate::traits::{AssetStore, CacheBackend};

/// Builder for [`AssetSystem`]
///
/// # Default Behavior
///
/// Parts not supplied explicitly come from the [`StoreConfig`]:
/// - **Store**: [`MemoryStore`] or [`SqlStore`] per `backend`
/// - **Cache**: Redis when `redis_url` is set, otherwise none
///
/// With a cache, the store is wrapped in a [`CachedStore`] using the
/// configured favourites TTL.
pub struct AssetStoreBuilder {
    config: StoreConfig,
    store: Option<Arc<dyn AssetStore>>,
    cache: Option<Arc<dyn CacheBackend>>,
}

impl AssetStoreBuilder {
    /// Create a builder with [`StoreConfig::default`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            store: None,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `store` instead of the configured backend
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Cache favourites in `cache` instead of the configured Redis
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the [`AssetSystem`]
    ///
    /// # Errors
    ///
    /// Returns an error if the database or a configured Redis cannot be reached.
    pub async fn build(self) -> Result<AssetSystem> {
        info!("Building asset store system");

        let store: Arc<dyn AssetStore> = match self.store {
            Some(store) => {
                info!(store = store.name(), "Using custom asset store");
                store
            }
            None => match self.config.backend {
                StoreBackend::Memory => {
                    info!("Using in-memory asset store");
                    Arc::new(MemoryStore::new())
                }
                StoreBackend::Sql => Arc::new(SqlStore::connect(&self.config.database_url).await?),
            },
        };

        let cache = match self.cache {
            Some(cache) => {
                info!(cache = cache.name(), "Using custom favourites cache");
                Some(cache)
            }
            None => configured_cache(&self.config).await?,
        };

        let store: Arc<dyn AssetStore> = match &cache {
            Some(cache) => Arc::new(
                CachedStore::new(store, Arc::clone(cache)).with_ttl(self.config.favourites_ttl),
            ),
            None => {
                info!("No favourites cache configured, serving favourites from store");
                store
            }
        };

        info!(store = store.name(), "Asset store system built successfully");
        Ok(AssetSystem { store, cache })
    }
}

impl Default for AssetStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "redis")]
async fn configured_cache(config: &StoreConfig) -> Result<Option<Arc<dyn CacheBackend>>> {
    use crate::backends::RedisCache;

    let Some(redis_url) = config.redis_url.as_deref() else {
        return Ok(None);
    };

    let mut cache = RedisCache::with_url(redis_url).await?;
    if let Some(timeout) = config.cache_timeout {
        cache = cache.with_timeout(timeout);
    }
    Ok(Some(Arc::new(cache)))
}

#[cfg(not(feature = "redis"))]
async fn configured_cache(config: &StoreConfig) -> Result<Option<Arc<dyn CacheBackend>>> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the `redis` feature is disabled, favourites will not be cached");
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DashMapCache;

    fn memory_config() -> StoreConfig {
        StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        }
    }

    #[tokio::test]
    async fn builds_plain_store_without_cache() {
        let system = AssetStoreBuilder::new()
            .with_config(memory_config())
            .build()
            .await
            .unwrap();

        assert_eq!(system.store().name(), "Memory");
        assert!(system.cache().is_none());
        assert!(system.health_check().await);
    }

    #[tokio::test]
    async fn wraps_store_when_cache_is_supplied() {
        let system = AssetStoreBuilder::new()
            .with_config(memory_config())
            .with_cache(Arc::new(DashMapCache::new()))
            .build()
            .await
            .unwrap();

        assert_eq!(system.store().name(), "Cached");
        assert_eq!(system.cache().map(|cache| cache.name()), Some("DashMap"));
    }

    #[tokio::test]
    async fn sql_backend_connects_to_configured_url() {
        let system = AssetStoreBuilder::new()
            .with_config(StoreConfig {
                database_url: "sqlite::memory:".to_string(),
                ..StoreConfig::default()
            })
            .build()
            .await
            .unwrap();

        assert_eq!(system.store().name(), "Sql");
        assert!(system.health_check().await);
    }
}
