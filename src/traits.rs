//! Store and Cache Backend Traits
//!
//! This module defines the two seams of the crate:
//!
//! - `AssetStore`: the storage contract implemented by the in-memory store,
//!   the SQL store and the cache-aside decorator
//! - `CacheBackend`: the key/value cache the decorator talks to
//!
//! Implementations are picked at construction time and shared as
//! `Arc<dyn AssetStore>` / `Arc<dyn CacheBackend>`.
//!
//! # Example: Custom Store
//!
//! ```rust,ignore
//! use asset_store::{AssetStore, Asset, AssetKind, Favourite, StoreResult, async_trait};
//!
//! struct MyStore {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl AssetStore for MyStore {
//!     async fn get(&self, user_id: &str) -> StoreResult<Vec<Asset>> {
//!         // Your implementation
//!     }
//!
//!     // ... implement the other operations
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, StoreResult};
use crate::model::{Asset, AssetKind, Favourite};

/// User-scoped storage of assets and favourites
///
/// # Not Found vs Failure
///
/// Operations that target a single asset or favourite report "nothing
/// matched" as `Ok(false)`. `Err` is reserved for backend failures; a failed
/// operation never leaves a partial write behind.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store instance serves every
/// request task.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Snapshot of the assets owned by `user_id`, possibly empty
    async fn get(&self, user_id: &str) -> StoreResult<Vec<Asset>>;

    /// Add an asset to the user's collection
    ///
    /// Adding an ID that already exists is a no-op, not an overwrite.
    async fn add(&self, user_id: &str, asset: Asset) -> StoreResult<()>;

    /// Remove an asset together with every favourite pointing at it
    ///
    /// Returns `Ok(false)` if the user owns no asset with that ID.
    async fn remove(&self, user_id: &str, asset_id: &str) -> StoreResult<bool>;

    /// Replace the description of an owned asset
    ///
    /// Returns `Ok(true)` only if an asset was actually updated.
    async fn edit_description(
        &self,
        user_id: &str,
        asset_id: &str,
        description: &str,
    ) -> StoreResult<bool>;

    /// The user's favourites with their full asset payloads
    async fn get_favourites(&self, user_id: &str) -> StoreResult<Vec<Favourite>>;

    /// Mark an owned asset as favourite
    ///
    /// Returns `Ok(false)` if the asset does not exist, belongs to another
    /// user, or is not of `kind`. Marking an existing favourite again
    /// returns `Ok(true)` and changes nothing.
    async fn add_favourite(&self, user_id: &str, asset_id: &str, kind: AssetKind)
    -> StoreResult<bool>;

    /// Returns `Ok(true)` if a favourite existed and was deleted
    async fn remove_favourite(&self, user_id: &str, asset_id: &str) -> StoreResult<bool>;

    /// Check if the store is operational
    async fn health_check(&self) -> bool {
        true
    }

    /// Name used in logs
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Outcome of a cache read
///
/// Errors are carried as a value so callers log them and move on; a cache
/// failure is never fatal to the caller's operation.
#[derive(Debug)]
pub enum CacheLookup {
    /// Value found
    Hit(Vec<u8>),
    /// Key absent or expired
    Miss,
    /// Backend unreachable or misbehaving
    Error(CacheError),
}

impl CacheLookup {
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Value bytes on a hit, `None` otherwise
    #[must_use]
    pub fn into_hit(self) -> Option<Vec<u8>> {
        match self {
            Self::Hit(bytes) => Some(bytes),
            Self::Miss | Self::Error(_) => None,
        }
    }
}

/// Key/value cache with per-key time-to-live
///
/// # Required Operations
///
/// - `get`: Retrieve a value by key
/// - `set_with_ttl`: Store a value with a time-to-live
/// - `remove`: Delete a value by key
/// - `health_check`: Verify cache backend is operational
///
/// Implementations must be `Send + Sync` to support concurrent access across
/// async tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get value from cache by key
    async fn get(&self, key: &str) -> CacheLookup;

    /// Set value in cache with time-to-live
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not store the value.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Remove value from cache; removing an absent key succeeds
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be reached.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Check if cache backend is healthy
    async fn health_check(&self) -> bool;

    /// Name used in logs (e.g., "Redis", "DashMap")
    fn name(&self) -> &'static str {
        "unknown"
    }
}
