//! Normalization and idempotent merge of remote items.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use marketsync_core::{CategoryId, ItemId, ShopId};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::db::{CatalogItemUpsert, MergeOutcome, RepositoryError, SyncStore};
use crate::marketplace::RemoteItem;
use crate::marketplace::types::RemoteWeight;

/// Status stored when the remote omits one.
const DEFAULT_ITEM_STATUS: &str = "NORMAL";

/// Errors merging a single item. Never fatal to a run.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The record is missing a required field.
    #[error("invalid item: {0}")]
    Invalid(String),

    /// The record does not have the expected shape.
    #[error("undecodable item: {0}")]
    Decode(#[from] serde_json::Error),

    /// The upsert failed.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Translate a raw remote record into the remote-owned catalog columns.
///
/// # Errors
///
/// Returns `MergeError::Decode` if the record has the wrong shape and
/// `MergeError::Invalid` if `item_id` is missing or non-positive or
/// `item_name` is blank.
pub fn normalize(raw: &Value) -> Result<CatalogItemUpsert, MergeError> {
    let remote: RemoteItem = serde_json::from_value(raw.clone())?;

    let item_id = remote
        .item_id
        .filter(|id| *id > 0)
        .ok_or_else(|| MergeError::Invalid("missing or non-positive item_id".to_string()))?;

    let item_name = remote
        .item_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| MergeError::Invalid(format!("item {item_id} has no item_name")))?
        .to_string();

    let price = remote
        .price_info
        .as_ref()
        .and_then(|prices| prices.first());
    let stock = remote
        .stock_info_v2
        .as_ref()
        .and_then(|info| info.summary_info.as_ref());
    let dimension = remote.dimension.as_ref();
    let brand = remote.brand.as_ref();

    let image_urls = remote
        .image
        .and_then(|image| image.image_url_list)
        .unwrap_or_default();
    let variants = remote
        .models
        .filter(|models| !models.is_empty())
        .or(remote.tier_variation)
        .unwrap_or_default();

    Ok(CatalogItemUpsert {
        item_id: ItemId::new(item_id),
        category_id: remote.category_id.map(CategoryId::new),
        item_name,
        description: remote.description,
        item_sku: remote.item_sku.filter(|sku| !sku.is_empty()),
        item_status: remote
            .item_status
            .filter(|status| !status.is_empty())
            .unwrap_or_else(|| DEFAULT_ITEM_STATUS.to_string()),
        currency: price.and_then(|p| p.currency.clone()),
        original_price: price.and_then(|p| p.original_price).and_then(to_money),
        current_price: price.and_then(|p| p.current_price).and_then(to_money),
        total_available_stock: stock.and_then(|s| s.total_available_stock).unwrap_or(0),
        total_reserved_stock: stock.and_then(|s| s.total_reserved_stock).unwrap_or(0),
        weight: remote.weight.as_ref().and_then(to_weight),
        package_length: dimension.and_then(|d| d.package_length),
        package_width: dimension.and_then(|d| d.package_width),
        package_height: dimension.and_then(|d| d.package_height),
        image_urls: Value::from(image_urls),
        attributes: Value::Array(remote.attribute_list.unwrap_or_default()),
        logistics: Value::Array(remote.logistic_info.unwrap_or_default()),
        variants: Value::Array(variants),
        has_model: remote.has_model.unwrap_or(false),
        brand_id: brand.and_then(|b| b.brand_id),
        brand_name: brand.and_then(|b| b.original_brand_name.clone()),
        item_condition: remote.condition,
        create_time: remote.create_time.and_then(from_unix),
        update_time: remote.update_time.and_then(from_unix),
    })
}

fn to_money(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok().map(|d| d.round_dp(2))
}

fn to_weight(weight: &RemoteWeight) -> Option<Decimal> {
    let value = match weight {
        RemoteWeight::Number(n) => Decimal::try_from(*n).ok()?,
        RemoteWeight::Text(s) => s.trim().parse::<Decimal>().ok()?,
    };
    Some(value.round_dp(3))
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    (secs > 0)
        .then(|| DateTime::from_timestamp(secs, 0))
        .flatten()
}

/// Per-run merge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeTally {
    pub inserted: u64,
    pub updated: u64,
    pub failed: u64,
}

impl MergeTally {
    /// Items merged either way.
    #[must_use]
    pub const fn synced(&self) -> u64 {
        self.inserted + self.updated
    }

    fn record(&mut self, result: &Result<MergeOutcome, MergeError>) {
        match result {
            Ok(MergeOutcome::Inserted) => self.inserted += 1,
            Ok(MergeOutcome::Updated) => self.updated += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Merges remote items into the local catalog.
#[derive(Clone)]
pub struct MergeEngine {
    store: Arc<dyn SyncStore>,
}

impl MergeEngine {
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Normalize and upsert one item.
    ///
    /// # Errors
    ///
    /// Returns `MergeError` if the record is invalid or the upsert fails.
    pub async fn merge(&self, shop_id: ShopId, raw: &Value) -> Result<MergeOutcome, MergeError> {
        let item = normalize(raw)?;
        let outcome = self.store.upsert_item(shop_id, &item, Utc::now()).await?;
        Ok(outcome)
    }

    /// Merge a batch of items, up to `concurrency` at a time.
    ///
    /// Failures are logged and counted; they never stop the batch.
    #[instrument(skip(self, items), fields(shop_id = %shop_id, items = items.len()))]
    pub async fn merge_all(
        &self,
        shop_id: ShopId,
        items: Vec<Value>,
        concurrency: usize,
    ) -> MergeTally {
        let mut results = stream::iter(items)
            .map(|raw| async move {
                let result = self.merge(shop_id, &raw).await;
                if let Err(err) = &result {
                    let item_id = raw.get("item_id").and_then(Value::as_i64);
                    warn!(?item_id, error = %err, "failed to merge item");
                }
                result
            })
            .buffer_unordered(concurrency.max(1));

        let mut tally = MergeTally::default();
        while let Some(result) = results.next().await {
            tally.record(&result);
        }
        tally
    }
}
