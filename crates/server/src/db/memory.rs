//! In-memory [`SyncStore`] for tests and local dry runs.
//!
//! Mirrors the `PostgreSQL` semantics: upserts only write remote-owned
//! columns, token updates replace all four token fields at once, and sync
//! runs are append-only.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketsync_core::{ItemId, PriceRuleId, ShopId, SyncRunId};
use rust_decimal::Decimal;
use secrecy::SecretString;

use super::{
    CatalogItem, CatalogItemUpsert, MergeOutcome, NewSyncRun, RepositoryError, ShopCredential,
    SyncRun, SyncStore, TokenUpdate,
};

/// A price change appended by an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    pub shop_id: ShopId,
    pub item_id: ItemId,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub recorded_at: DateTime<Utc>,
}

/// Locally-owned catalog columns, as written by operators or price rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFields {
    pub cost_price: Option<Decimal>,
    pub notes: Option<String>,
    pub price_rule_id: Option<PriceRuleId>,
    pub auto_adjust_enabled: bool,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Default)]
struct State {
    credentials: HashMap<ShopId, ShopCredential>,
    items: HashMap<(ShopId, ItemId), CatalogItem>,
    runs: Vec<SyncRun>,
    price_history: Vec<PriceChange>,
    unavailable: bool,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        let guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::DataCorruption("memory store lock poisoned".into()))?;
        if guard.unavailable {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(guard)
    }

    /// Simulate storage going away (every call fails) or coming back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the lock is poisoned.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::DataCorruption("memory store lock poisoned".into()))?
            .unavailable = unavailable;
        Ok(())
    }

    /// Insert or replace a credential, as the authorization handshake would.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn put_credential(&self, credential: ShopCredential) -> Result<(), RepositoryError> {
        self.lock()?
            .credentials
            .insert(credential.shop_id, credential);
        Ok(())
    }

    /// Write the locally-owned columns of an existing item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub fn set_local_fields(
        &self,
        shop_id: ShopId,
        item_id: ItemId,
        fields: LocalFields,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let item = state
            .items
            .get_mut(&(shop_id, item_id))
            .ok_or(RepositoryError::NotFound)?;
        item.cost_price = fields.cost_price;
        item.notes = fields.notes;
        item.price_rule_id = fields.price_rule_id;
        item.auto_adjust_enabled = fields.auto_adjust_enabled;
        item.min_price = fields.min_price;
        item.max_price = fields.max_price;
        Ok(())
    }

    /// All items of a shop, ordered by item id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn items(&self, shop_id: ShopId) -> Result<Vec<CatalogItem>, RepositoryError> {
        let state = self.lock()?;
        let mut items: Vec<CatalogItem> = state
            .items
            .values()
            .filter(|item| item.shop_id == shop_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.item_id);
        Ok(items)
    }

    /// Every recorded sync run, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn runs(&self) -> Result<Vec<SyncRun>, RepositoryError> {
        Ok(self.lock()?.runs.clone())
    }

    /// Every appended price change, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn price_history(&self) -> Result<Vec<PriceChange>, RepositoryError> {
        Ok(self.lock()?.price_history.clone())
    }
}

fn new_item(shop_id: ShopId, item: &CatalogItemUpsert, synced_at: DateTime<Utc>) -> CatalogItem {
    CatalogItem {
        shop_id,
        item_id: item.item_id,
        category_id: item.category_id,
        item_name: item.item_name.clone(),
        description: item.description.clone(),
        item_sku: item.item_sku.clone(),
        item_status: item.item_status.clone(),
        currency: item.currency.clone(),
        original_price: item.original_price,
        current_price: item.current_price,
        total_available_stock: item.total_available_stock,
        total_reserved_stock: item.total_reserved_stock,
        weight: item.weight,
        package_length: item.package_length,
        package_width: item.package_width,
        package_height: item.package_height,
        image_urls: item.image_urls.clone(),
        attributes: item.attributes.clone(),
        logistics: item.logistics.clone(),
        variants: item.variants.clone(),
        has_model: item.has_model,
        brand_id: item.brand_id,
        brand_name: item.brand_name.clone(),
        item_condition: item.item_condition.clone(),
        create_time: item.create_time,
        update_time: item.update_time,
        cost_price: None,
        notes: None,
        price_rule_id: None,
        auto_adjust_enabled: false,
        min_price: None,
        max_price: None,
        last_synced_at: synced_at,
        created_at: synced_at,
        updated_at: synced_at,
    }
}

fn apply_remote_fields(row: &mut CatalogItem, item: &CatalogItemUpsert, synced_at: DateTime<Utc>) {
    row.category_id = item.category_id;
    row.item_name.clone_from(&item.item_name);
    row.description.clone_from(&item.description);
    row.item_sku.clone_from(&item.item_sku);
    row.item_status.clone_from(&item.item_status);
    row.currency.clone_from(&item.currency);
    row.original_price = item.original_price;
    row.current_price = item.current_price;
    row.total_available_stock = item.total_available_stock;
    row.total_reserved_stock = item.total_reserved_stock;
    row.weight = item.weight;
    row.package_length = item.package_length;
    row.package_width = item.package_width;
    row.package_height = item.package_height;
    row.image_urls.clone_from(&item.image_urls);
    row.attributes.clone_from(&item.attributes);
    row.logistics.clone_from(&item.logistics);
    row.variants.clone_from(&item.variants);
    row.has_model = item.has_model;
    row.brand_id = item.brand_id;
    row.brand_name.clone_from(&item.brand_name);
    row.item_condition.clone_from(&item.item_condition);
    row.create_time = item.create_time;
    row.update_time = item.update_time;
    row.last_synced_at = synced_at;
    row.updated_at = synced_at;
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.lock().map(|_| ())
    }

    async fn get_credential(
        &self,
        shop_id: ShopId,
    ) -> Result<Option<ShopCredential>, RepositoryError> {
        Ok(self.lock()?.credentials.get(&shop_id).cloned())
    }

    async fn update_tokens(
        &self,
        shop_id: ShopId,
        update: &TokenUpdate<'_>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let Some(credential) = state.credentials.get_mut(&shop_id) else {
            return Ok(false);
        };
        *credential = ShopCredential {
            shop_id,
            access_token: SecretString::from(update.access_token),
            refresh_token: update.refresh_token.map(SecretString::from),
            access_token_expires_at: update.access_token_expires_at,
            refresh_token_expires_at: update.refresh_token_expires_at,
            updated_at: update.updated_at,
        };
        Ok(true)
    }

    async fn upsert_item(
        &self,
        shop_id: ShopId,
        item: &CatalogItemUpsert,
        synced_at: DateTime<Utc>,
    ) -> Result<MergeOutcome, RepositoryError> {
        let mut state = self.lock()?;
        let key = (shop_id, item.item_id);

        let Some(row) = state.items.get_mut(&key) else {
            state.items.insert(key, new_item(shop_id, item, synced_at));
            return Ok(MergeOutcome::Inserted);
        };

        let previous_price = row.current_price;
        apply_remote_fields(row, item, synced_at);

        if previous_price != item.current_price {
            state.price_history.push(PriceChange {
                shop_id,
                item_id: item.item_id,
                old_price: previous_price,
                new_price: item.current_price,
                recorded_at: synced_at,
            });
        }
        Ok(MergeOutcome::Updated)
    }

    async fn insert_sync_run(&self, run: &NewSyncRun) -> Result<SyncRun, RepositoryError> {
        let mut state = self.lock()?;
        let next_id = i64::try_from(state.runs.len())
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?
            + 1;
        let row = SyncRun {
            id: SyncRunId::new(next_id),
            shop_id: run.shop_id,
            sync_type: run.sync_type,
            status: run.status,
            items_synced: run.items_synced,
            items_failed: run.items_failed,
            total_fetched: run.total_fetched,
            error_message: run.error_message.clone(),
            started_at: run.started_at,
            completed_at: run.completed_at,
        };
        state.runs.push(row.clone());
        Ok(row)
    }

    async fn recent_sync_runs(
        &self,
        shop_id: ShopId,
        limit: i64,
    ) -> Result<Vec<SyncRun>, RepositoryError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .lock()?
            .runs
            .iter()
            .rev()
            .filter(|run| run.shop_id == shop_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
