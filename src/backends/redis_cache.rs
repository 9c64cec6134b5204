//! Redis Cache - Distributed Cache Backend
//!
//! Redis-based cache for the favourites lists, with optional per-call timeout.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};
use tracing::{debug, info};

use crate::error::CacheError;
use crate::traits::{CacheBackend, CacheLookup};

/// Redis cache with `ConnectionManager` for automatic reconnection
///
/// Every command is a blocking network round-trip with no timeout unless one
/// is set with [`with_timeout`](Self::with_timeout); a call that exceeds it
/// fails with [`CacheError::Timeout`].
pub struct RedisCache {
    /// Redis connection manager - handles reconnection automatically
    conn_manager: ConnectionManager,
    /// Per-command deadline
    timeout: Option<Duration>,
}

impl RedisCache {
    /// Create new Redis cache using `REDIS_URL` (default `redis://127.0.0.1:6379`)
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn new() -> Result<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        Self::with_url(&redis_url).await
    }

    /// Create new Redis cache with custom URL
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., `<redis://localhost:6379>`)
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        info!(redis_url = %redis_url, "Initializing Redis Cache with ConnectionManager");

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .context("Failed to establish Redis connection manager")?;

        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %redis_url, "Redis Cache connected successfully (ConnectionManager enabled)");

        Ok(Self {
            conn_manager,
            timeout: None,
        })
    }

    /// Bound every command by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run<T, F>(&self, command: F) -> Result<T, CacheError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command)
                .await
                .map_err(|_| CacheError::Timeout(limit))?
                .map_err(CacheError::from),
            None => command.await.map_err(CacheError::from),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> CacheLookup {
        let mut conn = self.conn_manager.clone();

        match self.run(conn.get::<_, Option<Vec<u8>>>(key)).await {
            Ok(Some(value)) if !value.is_empty() => CacheLookup::Hit(value),
            Ok(_) => CacheLookup::Miss,
            Err(err) => CacheLookup::Error(err),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();

        // SETEX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        self.run(conn.set_ex::<_, _, ()>(key, value, ttl_secs)).await?;
        debug!(key = %key, ttl_secs = %ttl_secs, "[Redis] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        self.run(conn.del::<_, ()>(key)).await?;
        debug!(key = %key, "[Redis] Removed key");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn_manager.clone();
        let ping = redis::cmd("PING");
        let reply: Result<String, CacheError> = self.run(ping.query_async(&mut conn)).await;
        matches!(reply, Ok(ref pong) if pong == "PONG")
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}
