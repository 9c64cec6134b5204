//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Store constructors for each backend
//! - Asset fixtures
//! - A cache backend with switchable failures
//! - A store wrapper that counts calls reaching it
//! - Contract scenarios every store must pass

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use asset_store::{
    Asset, AssetKind, AssetStore, CacheBackend, CacheError, CacheLookup, DashMapCache, Favourite,
    MemoryStore, SqlStore, StoreResult, async_trait,
};

/// Route library logs to the test output; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Fresh user ID so tests never share rows or cache keys
pub fn user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Get Redis URL from environment or use default
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

pub fn memory_store() -> Arc<dyn AssetStore> {
    init_tracing();
    Arc::new(MemoryStore::new())
}

pub async fn sql_store() -> Arc<SqlStore> {
    init_tracing();
    Arc::new(SqlStore::in_memory().await.expect("Failed to open in-memory SQLite"))
}

/// Generate test assets of each variant
pub mod test_data {
    use asset_store::{Asset, Audience, Chart, ChartDataPoint, Insight};

    pub fn chart(id: &str) -> Asset {
        Asset::from(Chart {
            id: id.to_string(),
            title: format!("Chart {id}"),
            description: "Monthly revenue".to_string(),
            x_axis_title: "month".to_string(),
            y_axis_title: "revenue".to_string(),
            data: vec![
                ChartDataPoint::new("jan", 10.5),
                ChartDataPoint::new("feb", 7.25),
                ChartDataPoint::new("mar", 12.0),
            ],
        })
    }

    /// Chart with `points` random values under codes `p0`, `p1`, ...
    pub fn random_chart(id: &str, points: usize) -> Asset {
        Asset::from(Chart {
            id: id.to_string(),
            title: format!("Chart {id}"),
            data: (0..points)
                .map(|i| ChartDataPoint::new(format!("p{i}"), rand::random::<f64>() * 100.0))
                .collect(),
            ..Chart::default()
        })
    }

    pub fn insight(id: &str) -> Asset {
        Asset::from(Insight {
            id: id.to_string(),
            description: "40% of millennials spend more than 3 hours on social media daily"
                .to_string(),
        })
    }

    pub fn audience(id: &str) -> Asset {
        Asset::from(Audience {
            id: id.to_string(),
            gender: "female".to_string(),
            country: "GR".to_string(),
            age_group: "24-35".to_string(),
            social_hours: 3,
            purchases: 12,
            description: "Frequent shoppers".to_string(),
        })
    }
}

/// Cache backend that fails every call while `failing` is set
///
/// Healthy calls go to an inner [`DashMapCache`].
#[derive(Default)]
pub struct FlakyCache {
    inner: DashMapCache,
    failing: AtomicBool,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub removes: AtomicUsize,
    pub health_checks: AtomicUsize,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &DashMapCache {
        &self.inner
    }

    fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for FlakyCache {
    async fn get(&self, key: &str) -> CacheLookup {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.is_failing() {
            return CacheLookup::Error(CacheError::Unavailable("injected failure".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.is_failing() {
            return Err(CacheError::Unavailable("injected failure".to_string()));
        }
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if self.is_failing() {
            return Err(CacheError::Unavailable("injected failure".to_string()));
        }
        self.inner.remove(key).await
    }

    async fn health_check(&self) -> bool {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        !self.is_failing()
    }

    fn name(&self) -> &'static str {
        "Flaky"
    }
}

/// Store wrapper counting the calls that reach the wrapped store
pub struct CountingStore {
    inner: Arc<dyn AssetStore>,
    pub get_favourites_calls: AtomicUsize,
    pub total_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn AssetStore>) -> Self {
        Self {
            inner,
            get_favourites_calls: AtomicUsize::new(0),
            total_calls: AtomicUsize::new(0),
        }
    }

    pub fn favourites_reads(&self) -> usize {
        self.get_favourites_calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetStore for CountingStore {
    async fn get(&self, user_id: &str) -> StoreResult<Vec<Asset>> {
        self.count();
        self.inner.get(user_id).await
    }

    async fn add(&self, user_id: &str, asset: Asset) -> StoreResult<()> {
        self.count();
        self.inner.add(user_id, asset).await
    }

    async fn remove(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        self.count();
        self.inner.remove(user_id, asset_id).await
    }

    async fn edit_description(
        &self,
        user_id: &str,
        asset_id: &str,
        description: &str,
    ) -> StoreResult<bool> {
        self.count();
        self.inner.edit_description(user_id, asset_id, description).await
    }

    async fn get_favourites(&self, user_id: &str) -> StoreResult<Vec<Favourite>> {
        self.count();
        self.get_favourites_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_favourites(user_id).await
    }

    async fn add_favourite(
        &self,
        user_id: &str,
        asset_id: &str,
        kind: AssetKind,
    ) -> StoreResult<bool> {
        self.count();
        self.inner.add_favourite(user_id, asset_id, kind).await
    }

    async fn remove_favourite(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        self.count();
        self.inner.remove_favourite(user_id, asset_id).await
    }

    fn name(&self) -> &'static str {
        "Counting"
    }
}

pub fn favourite_ids(favourites: &[Favourite]) -> Vec<&str> {
    favourites.iter().map(|favourite| favourite.asset.id()).collect()
}

pub fn asset_ids(assets: &[Asset]) -> Vec<&str> {
    assets.iter().map(Asset::id).collect()
}

/// Behaviour every [`AssetStore`] shares, run against each backend
///
/// Each scenario expects a fresh store: asset IDs are global in the SQL schema.
pub mod contract {
    use super::*;

    /// Add, favourite, unfavourite and remove one chart
    pub async fn chart_lifecycle(store: &dyn AssetStore) {
        let user = user_id();

        store.add(&user, test_data::chart("c1")).await.unwrap();

        let assets = store.get(&user).await.unwrap();
        assert_eq!(assets, vec![test_data::chart("c1")]);

        assert!(store.add_favourite(&user, "c1", AssetKind::Chart).await.unwrap());
        let favourites = store.get_favourites(&user).await.unwrap();
        assert_eq!(favourites, vec![Favourite::new(&user, test_data::chart("c1"))]);

        assert!(store.remove_favourite(&user, "c1").await.unwrap());
        assert!(store.get_favourites(&user).await.unwrap().is_empty());

        assert!(store.remove(&user, "c1").await.unwrap());
        assert!(store.get(&user).await.unwrap().is_empty());
        assert!(!store.remove(&user, "c1").await.unwrap());
    }

    pub async fn unknown_user_has_nothing(store: &dyn AssetStore) {
        let user = user_id();
        assert!(store.get(&user).await.unwrap().is_empty());
        assert!(store.get_favourites(&user).await.unwrap().is_empty());
        assert!(!store.remove(&user, "missing").await.unwrap());
        assert!(!store.edit_description(&user, "missing", "x").await.unwrap());
        assert!(!store.remove_favourite(&user, "missing").await.unwrap());
    }

    /// Every variant comes back field for field, in insertion order
    pub async fn keeps_all_variants_in_order(store: &dyn AssetStore) {
        let user = user_id();
        let assets = vec![
            test_data::audience("a1"),
            test_data::chart("c1"),
            test_data::insight("i1"),
            test_data::random_chart("c2", 8),
        ];
        for asset in &assets {
            store.add(&user, asset.clone()).await.unwrap();
        }

        assert_eq!(store.get(&user).await.unwrap(), assets);
    }

    pub async fn duplicate_add_is_ignored(store: &dyn AssetStore) {
        let user = user_id();
        store.add(&user, test_data::insight("i1")).await.unwrap();

        let mut replacement = test_data::insight("i1");
        replacement.set_description("replacement");
        store.add(&user, replacement).await.unwrap();

        assert_eq!(store.get(&user).await.unwrap(), vec![test_data::insight("i1")]);
    }

    pub async fn remove_missing_changes_nothing(store: &dyn AssetStore) {
        let user = user_id();
        store.add(&user, test_data::chart("c1")).await.unwrap();
        store.add_favourite(&user, "c1", AssetKind::Chart).await.unwrap();

        assert!(!store.remove(&user, "c2").await.unwrap());

        assert_eq!(asset_ids(&store.get(&user).await.unwrap()), vec!["c1"]);
        assert_eq!(favourite_ids(&store.get_favourites(&user).await.unwrap()), vec!["c1"]);
    }

    pub async fn edit_description_updates_every_variant(store: &dyn AssetStore) {
        let user = user_id();
        for asset in [
            test_data::chart("c1"),
            test_data::insight("i1"),
            test_data::audience("a1"),
        ] {
            store.add(&user, asset).await.unwrap();
        }

        for id in ["c1", "i1", "a1"] {
            assert!(store.edit_description(&user, id, "edited").await.unwrap());
        }
        assert!(!store.edit_description(&user, "missing", "edited").await.unwrap());

        let assets = store.get(&user).await.unwrap();
        assert_eq!(assets.len(), 3);
        assert!(assets.iter().all(|asset| asset.description() == "edited"));

        // Other fields are untouched
        let mut expected = test_data::audience("a1");
        expected.set_description("edited");
        assert_eq!(assets.get(2), Some(&expected));
    }

    pub async fn favourites_require_ownership_and_matching_kind(store: &dyn AssetStore) {
        let owner = user_id();
        let other = user_id();
        store.add(&owner, test_data::insight("i1")).await.unwrap();

        assert!(!store.add_favourite(&other, "i1", AssetKind::Insight).await.unwrap());
        assert!(!store.add_favourite(&owner, "missing", AssetKind::Insight).await.unwrap());
        assert!(!store.add_favourite(&owner, "i1", AssetKind::Chart).await.unwrap());

        assert!(store.get_favourites(&owner).await.unwrap().is_empty());
        assert!(store.get_favourites(&other).await.unwrap().is_empty());
    }

    pub async fn duplicate_favourite_is_accepted_once(store: &dyn AssetStore) {
        let user = user_id();
        store.add(&user, test_data::audience("a1")).await.unwrap();

        assert!(store.add_favourite(&user, "a1", AssetKind::Audience).await.unwrap());
        assert!(store.add_favourite(&user, "a1", AssetKind::Audience).await.unwrap());

        let favourites = store.get_favourites(&user).await.unwrap();
        assert_eq!(favourite_ids(&favourites), vec!["a1"]);
        assert!(store.remove_favourite(&user, "a1").await.unwrap());
        assert!(!store.remove_favourite(&user, "a1").await.unwrap());
    }

    pub async fn remove_drops_favourite(store: &dyn AssetStore) {
        let user = user_id();
        store.add(&user, test_data::chart("c1")).await.unwrap();
        store.add(&user, test_data::insight("i1")).await.unwrap();
        store.add_favourite(&user, "c1", AssetKind::Chart).await.unwrap();
        store.add_favourite(&user, "i1", AssetKind::Insight).await.unwrap();

        assert!(store.remove(&user, "c1").await.unwrap());

        assert_eq!(favourite_ids(&store.get_favourites(&user).await.unwrap()), vec!["i1"]);
        assert!(!store.remove_favourite(&user, "c1").await.unwrap());
    }

    pub async fn users_are_isolated(store: &dyn AssetStore) {
        let alice = user_id();
        let bob = user_id();
        store.add(&alice, test_data::chart("alice-c1")).await.unwrap();
        store.add(&bob, test_data::insight("bob-i1")).await.unwrap();

        assert!(!store.remove(&bob, "alice-c1").await.unwrap());
        assert!(!store.edit_description(&bob, "alice-c1", "hijacked").await.unwrap());

        assert_eq!(store.get(&alice).await.unwrap(), vec![test_data::chart("alice-c1")]);
        assert_eq!(asset_ids(&store.get(&bob).await.unwrap()), vec!["bob-i1"]);
    }
}
