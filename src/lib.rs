//! Asset Store
//!
//! Per-user storage of polymorphic analytics assets with favourites:
//! - **Assets**: charts, insights and audiences behind one tagged [`Asset`] type
//! - **Stores**: in-memory ([`MemoryStore`]) and relational ([`SqlStore`]) backends
//!   sharing the [`AssetStore`] contract
//! - **Favourites Cache**: [`CachedStore`] adds cache-aside over any store, with
//!   Redis or in-process ([`DashMapCache`]) backends
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use asset_store::{Asset, AssetKind, AssetSystem, Insight};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let system = AssetSystem::from_env().await?;
//!     let store = system.store();
//!
//!     store
//!         .add("alice", Asset::from(Insight { id: "i1".into(), description: "Sales up".into() }))
//!         .await?;
//!     store.add_favourite("alice", "i1", AssetKind::Insight).await?;
//!
//!     for favourite in store.get_favourites("alice").await? {
//!         tracing::info!(asset_id = favourite.asset.id(), "favourite");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller → CachedStore ── get_favourites ──→ cache (favourites:<user>) ─ hit → return
//!               │                                   ↓ miss / error
//!               └── everything else ──────────→ MemoryStore | SqlStore
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

pub mod backends;
pub mod builder;
pub mod config;
pub mod error;
pub mod model;
pub mod stores;
pub mod traits;

pub use backends::DashMapCache;
#[cfg(feature = "redis")]
pub use backends::RedisCache;
pub use builder::AssetStoreBuilder;
pub use config::{StoreBackend, StoreConfig};
pub use error::{CacheError, StoreError, StoreResult, ValidationError};
pub use model::{
    Asset, AssetKind, AssetRecord, Audience, Chart, ChartDataPoint, Favourite, Insight,
};
pub use stores::{
    CachedStore, CachedStoreStats, FAVOURITES_TTL, MemoryStore, SqlStore, favourites_cache_key,
};
pub use traits::{AssetStore, CacheBackend, CacheLookup};

// Re-export async_trait for implementors of the traits
pub use async_trait::async_trait;

/// Main entry point: the configured store plus the favourites cache behind it
///
/// # Example
///
/// ```rust,no_run
/// use asset_store::{AssetSystem, StoreConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let system = AssetSystem::new(StoreConfig::default()).await?;
///     let assets = system.store().get("alice").await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AssetSystem {
    /// Already wrapped in [`CachedStore`] when a cache is configured
    store: Arc<dyn AssetStore>,
    /// Favourites cache, `None` when caching is disabled
    cache: Option<Arc<dyn CacheBackend>>,
}

impl AssetSystem {
    /// Build a system from `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the database or a configured Redis cannot be reached.
    pub async fn new(config: StoreConfig) -> Result<Self> {
        AssetStoreBuilder::new().with_config(config).build().await
    }

    /// Build a system from environment variables (see [`StoreConfig`])
    ///
    /// # Errors
    ///
    /// Returns an error if the environment is invalid or a backend cannot be reached.
    pub async fn from_env() -> Result<Self> {
        info!("Initializing asset store system from environment");
        Self::new(StoreConfig::from_env()?).await
    }

    /// Store to call for all asset and favourite operations
    #[must_use]
    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.cache.as_ref()
    }

    /// Perform health check on the store
    ///
    /// Returns `true` if the store is operational. A configured cache is
    /// checked by the [`CachedStore`] wrapping the store; a failing cache is
    /// tolerated since favourites fall back to the store.
    pub async fn health_check(&self) -> bool {
        let store_ok = self.store.health_check().await;
        if store_ok {
            info!(store = self.store.name(), "Asset store health check passed");
        } else {
            warn!(store = self.store.name(), "Asset store health check failed");
        }
        store_ok
    }
}
