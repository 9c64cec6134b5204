//! Environment Configuration
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `ASSET_STORE_BACKEND` | `memory` or `sql` | `sql` |
//! | `DATABASE_URL` | SQLite connection string | `sqlite://assets.db?mode=rwc` |
//! | `REDIS_URL` | Redis URL; unset disables caching | unset |
//! | `FAVOURITES_CACHE_TTL_SECS` | favourites TTL in seconds | `300` |
//! | `CACHE_TIMEOUT_MS` | per-command Redis timeout | unset |
//!
//! Empty variables count as unset.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::stores::FAVOURITES_TTL;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://assets.db?mode=rwc";

/// Which [`AssetStore`](crate::traits::AssetStore) backs the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sql,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sql" | "sqlite" => Ok(Self::Sql),
            other => bail!("unknown store backend {other:?}, expected \"memory\" or \"sql\""),
        }
    }
}

/// Settings for building an [`AssetSystem`](crate::AssetSystem)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: String,
    /// `None` disables the favourites cache
    pub redis_url: Option<String>,
    pub favourites_ttl: Duration,
    pub cache_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sql,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: None,
            favourites_ttl: FAVOURITES_TTL,
            cache_timeout: None,
        }
    }
}

impl StoreConfig {
    /// Read configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let backend = match get("ASSET_STORE_BACKEND") {
            Some(value) => value.parse().context("Invalid ASSET_STORE_BACKEND")?,
            None => defaults.backend,
        };

        let favourites_ttl = match get("FAVOURITES_CACHE_TTL_SECS") {
            Some(value) => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid FAVOURITES_CACHE_TTL_SECS: {value:?}"))?;
                if secs == 0 {
                    bail!("FAVOURITES_CACHE_TTL_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => defaults.favourites_ttl,
        };

        let cache_timeout = get("CACHE_TIMEOUT_MS")
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .with_context(|| format!("Invalid CACHE_TIMEOUT_MS: {value:?}"))
            })
            .transpose()?;

        Ok(Self {
            backend,
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            redis_url: get("REDIS_URL"),
            favourites_ttl,
            cache_timeout,
        })
    }
}
