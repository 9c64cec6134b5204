//! Cache Backend Implementations
//!
//! # Available Backends
//!
//! - **Redis** - Distributed cache shared by every process (feature: `redis`, default)
//! - **`DashMap`** - In-process concurrent `HashMap`, for development and tests
//!
//! # Usage
//!
//! ```rust,no_run
//! use asset_store::backends::{DashMapCache, RedisCache};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let redis = RedisCache::with_url("redis://localhost:6379").await?;
//! let local = DashMapCache::new();
//! # Ok(())
//! # }
//! ```

pub mod dashmap_cache;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use dashmap_cache::DashMapCache;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
