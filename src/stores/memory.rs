//! In-Memory Store
//!
//! Map-backed [`AssetStore`] for development and tests. One read/write lock
//! guards both tables for the whole call: reads share it, writes hold it
//! exclusively. The lock is never held across an `.await`.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::model::{Asset, AssetKind, Favourite};
use crate::traits::AssetStore;

#[derive(Default)]
struct Tables {
    /// user ID -> assets, in insertion order
    assets: HashMap<String, Vec<Asset>>,
    /// user ID -> favourite asset IDs, in insertion order
    favourites: HashMap<String, Vec<String>>,
}

impl Tables {
    fn find(&self, user_id: &str, asset_id: &str) -> Option<&Asset> {
        self.assets
            .get(user_id)?
            .iter()
            .find(|asset| asset.id() == asset_id)
    }
}

/// Thread-safe map-backed asset store
///
/// The tables belong to this instance; two stores never share state.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn get(&self, user_id: &str) -> StoreResult<Vec<Asset>> {
        debug!(user_id = %user_id, "[Memory] get");
        let tables = self.tables.read();
        Ok(tables.assets.get(user_id).cloned().unwrap_or_default())
    }

    async fn add(&self, user_id: &str, asset: Asset) -> StoreResult<()> {
        debug!(user_id = %user_id, asset_id = %asset.id(), "[Memory] add");
        let mut tables = self.tables.write();
        let owned = tables.assets.entry(user_id.to_string()).or_default();

        if owned.iter().any(|existing| existing.id() == asset.id()) {
            debug!(user_id = %user_id, asset_id = %asset.id(), "[Memory] Asset already exists, ignoring add");
            return Ok(());
        }
        owned.push(asset);
        Ok(())
    }

    async fn remove(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, "[Memory] remove");
        let mut tables = self.tables.write();

        let Some(owned) = tables.assets.get_mut(user_id) else {
            return Ok(false);
        };
        let Some(position) = owned.iter().position(|asset| asset.id() == asset_id) else {
            return Ok(false);
        };
        owned.remove(position);

        if let Some(favourites) = tables.favourites.get_mut(user_id) {
            favourites.retain(|favourite| favourite != asset_id);
        }
        Ok(true)
    }

    async fn edit_description(
        &self,
        user_id: &str,
        asset_id: &str,
        description: &str,
    ) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, "[Memory] edit_description");
        let mut tables = self.tables.write();

        let target = tables
            .assets
            .get_mut(user_id)
            .and_then(|owned| owned.iter_mut().find(|asset| asset.id() == asset_id));

        match target {
            Some(asset) => {
                asset.set_description(description);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_favourites(&self, user_id: &str) -> StoreResult<Vec<Favourite>> {
        debug!(user_id = %user_id, "[Memory] get_favourites");
        let tables = self.tables.read();

        let Some(favourite_ids) = tables.favourites.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(favourite_ids
            .iter()
            .filter_map(|asset_id| tables.find(user_id, asset_id))
            .map(|asset| Favourite::new(user_id, asset.clone()))
            .collect())
    }

    async fn add_favourite(
        &self,
        user_id: &str,
        asset_id: &str,
        kind: AssetKind,
    ) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, kind = %kind, "[Memory] add_favourite");
        let mut tables = self.tables.write();

        match tables.find(user_id, asset_id).map(Asset::kind) {
            None => {
                warn!(user_id = %user_id, asset_id = %asset_id, "[Memory] Favourite rejected: asset not owned by user");
                return Ok(false);
            }
            Some(stored) if stored != kind => {
                warn!(user_id = %user_id, asset_id = %asset_id, stored = %stored, requested = %kind, "[Memory] Favourite rejected: asset type mismatch");
                return Ok(false);
            }
            Some(_) => {}
        }

        let favourites = tables.favourites.entry(user_id.to_string()).or_default();
        if !favourites.iter().any(|favourite| favourite == asset_id) {
            favourites.push(asset_id.to_string());
        }
        Ok(true)
    }

    async fn remove_favourite(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, "[Memory] remove_favourite");
        let mut tables = self.tables.write();

        let Some(favourites) = tables.favourites.get_mut(user_id) else {
            return Ok(false);
        };
        let Some(position) = favourites.iter().position(|favourite| favourite == asset_id) else {
            return Ok(false);
        };
        favourites.remove(position);
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
