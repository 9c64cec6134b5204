//! Error Types
//!
//! - [`ValidationError`]: rejected input, never reaches a store
//! - [`StoreError`]: a storage backend failed; nothing was partially applied
//! - [`CacheError`]: a cache call failed; always recoverable by skipping the cache

use std::time::Duration;

use thiserror::Error;

/// Input that cannot become an asset or asset tag
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("asset type required")]
    MissingType,

    #[error("unknown asset type: {0}")]
    UnknownAssetType(String),

    #[error("asset id required")]
    MissingId,

    #[error("malformed asset payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Storage backend failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An `asset_type` column holds a tag this build does not know
    #[error("asset {asset_id} has unknown stored type {asset_type:?}")]
    UnknownStoredType { asset_id: String, asset_type: String },
}

/// Result alias for [`AssetStore`](crate::traits::AssetStore) operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Cache backend failure
#[derive(Debug, Error)]
pub enum CacheError {
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}
