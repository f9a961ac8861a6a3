//! Catalog item repository.
//!
//! Catalog rows mix two kinds of columns: those mirrored from the marketplace
//! (rewritten on every merge) and those maintained locally by price rules and
//! operators (`cost_price`, `notes`, `price_rule_id`, `auto_adjust_enabled`,
//! `min_price`, `max_price`). The upsert here only ever writes the former.

use chrono::{DateTime, Utc};
use marketsync_core::{CategoryId, ItemId, PriceRuleId, ShopId};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;

// =============================================================================
// Types
// =============================================================================

/// A catalog item as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CatalogItem {
    pub shop_id: ShopId,
    pub item_id: ItemId,

    // Remote-owned
    pub category_id: Option<CategoryId>,
    pub item_name: String,
    pub description: Option<String>,
    pub item_sku: Option<String>,
    pub item_status: String,
    pub currency: Option<String>,
    pub original_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub total_available_stock: i64,
    pub total_reserved_stock: i64,
    pub weight: Option<Decimal>,
    pub package_length: Option<i32>,
    pub package_width: Option<i32>,
    pub package_height: Option<i32>,
    pub image_urls: serde_json::Value,
    pub attributes: serde_json::Value,
    pub logistics: serde_json::Value,
    pub variants: serde_json::Value,
    pub has_model: bool,
    pub brand_id: Option<i64>,
    pub brand_name: Option<String>,
    pub item_condition: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,

    // Locally-owned
    pub cost_price: Option<Decimal>,
    pub notes: Option<String>,
    pub price_rule_id: Option<PriceRuleId>,
    pub auto_adjust_enabled: bool,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,

    /// Set by the merge engine only.
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// The remote-owned columns of this row.
    #[must_use]
    pub fn remote_fields(&self) -> CatalogItemUpsert {
        CatalogItemUpsert {
            item_id: self.item_id,
            category_id: self.category_id,
            item_name: self.item_name.clone(),
            description: self.description.clone(),
            item_sku: self.item_sku.clone(),
            item_status: self.item_status.clone(),
            currency: self.currency.clone(),
            original_price: self.original_price,
            current_price: self.current_price,
            total_available_stock: self.total_available_stock,
            total_reserved_stock: self.total_reserved_stock,
            weight: self.weight,
            package_length: self.package_length,
            package_width: self.package_width,
            package_height: self.package_height,
            image_urls: self.image_urls.clone(),
            attributes: self.attributes.clone(),
            logistics: self.logistics.clone(),
            variants: self.variants.clone(),
            has_model: self.has_model,
            brand_id: self.brand_id,
            brand_name: self.brand_name.clone(),
            item_condition: self.item_condition.clone(),
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

/// Remote-owned columns of a catalog item, as produced by normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItemUpsert {
    pub item_id: ItemId,
    pub category_id: Option<CategoryId>,
    pub item_name: String,
    pub description: Option<String>,
    pub item_sku: Option<String>,
    pub item_status: String,
    pub currency: Option<String>,
    pub original_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub total_available_stock: i64,
    pub total_reserved_stock: i64,
    pub weight: Option<Decimal>,
    pub package_length: Option<i32>,
    pub package_width: Option<i32>,
    pub package_height: Option<i32>,
    pub image_urls: serde_json::Value,
    pub attributes: serde_json::Value,
    pub logistics: serde_json::Value,
    pub variants: serde_json::Value,
    pub has_model: bool,
    pub brand_id: Option<i64>,
    pub brand_name: Option<String>,
    pub item_condition: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

/// Whether a merge created or updated the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog item database operations.
pub struct CatalogItemRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogItemRepository<'a> {
    /// Create a new catalog item repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update the remote-owned columns of an item.
    ///
    /// Runs in one transaction: the upsert itself plus a `price_history`
    /// row when an existing item's `current_price` changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// written in that case.
    pub async fn upsert(
        &self,
        shop_id: ShopId,
        item: &CatalogItemUpsert,
        synced_at: DateTime<Utc>,
    ) -> Result<MergeOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (inserted, previous_price): (bool, Option<Decimal>) = sqlx::query_as(
            r"
            WITH previous AS (
                SELECT current_price FROM catalog_items
                WHERE shop_id = $1 AND item_id = $2
            )
            INSERT INTO catalog_items (
                shop_id, item_id, category_id, item_name, description, item_sku,
                item_status, currency, original_price, current_price,
                total_available_stock, total_reserved_stock, weight,
                package_length, package_width, package_height,
                image_urls, attributes, logistics, variants, has_model,
                brand_id, brand_name, item_condition, create_time, update_time,
                last_synced_at, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                $27, $27, $27
            )
            ON CONFLICT (shop_id, item_id) DO UPDATE SET
                category_id = EXCLUDED.category_id,
                item_name = EXCLUDED.item_name,
                description = EXCLUDED.description,
                item_sku = EXCLUDED.item_sku,
                item_status = EXCLUDED.item_status,
                currency = EXCLUDED.currency,
                original_price = EXCLUDED.original_price,
                current_price = EXCLUDED.current_price,
                total_available_stock = EXCLUDED.total_available_stock,
                total_reserved_stock = EXCLUDED.total_reserved_stock,
                weight = EXCLUDED.weight,
                package_length = EXCLUDED.package_length,
                package_width = EXCLUDED.package_width,
                package_height = EXCLUDED.package_height,
                image_urls = EXCLUDED.image_urls,
                attributes = EXCLUDED.attributes,
                logistics = EXCLUDED.logistics,
                variants = EXCLUDED.variants,
                has_model = EXCLUDED.has_model,
                brand_id = EXCLUDED.brand_id,
                brand_name = EXCLUDED.brand_name,
                item_condition = EXCLUDED.item_condition,
                create_time = EXCLUDED.create_time,
                update_time = EXCLUDED.update_time,
                last_synced_at = EXCLUDED.last_synced_at,
                updated_at = EXCLUDED.last_synced_at
            RETURNING
                (xmax = 0) AS inserted,
                (SELECT current_price FROM previous) AS previous_price
            ",
        )
        .bind(shop_id)
        .bind(item.item_id)
        .bind(item.category_id)
        .bind(&item.item_name)
        .bind(&item.description)
        .bind(&item.item_sku)
        .bind(&item.item_status)
        .bind(&item.currency)
        .bind(item.original_price)
        .bind(item.current_price)
        .bind(item.total_available_stock)
        .bind(item.total_reserved_stock)
        .bind(item.weight)
        .bind(item.package_length)
        .bind(item.package_width)
        .bind(item.package_height)
        .bind(&item.image_urls)
        .bind(&item.attributes)
        .bind(&item.logistics)
        .bind(&item.variants)
        .bind(item.has_model)
        .bind(item.brand_id)
        .bind(&item.brand_name)
        .bind(&item.item_condition)
        .bind(item.create_time)
        .bind(item.update_time)
        .bind(synced_at)
        .fetch_one(&mut *tx)
        .await?;

        if !inserted && previous_price != item.current_price {
            sqlx::query(
                r"
                INSERT INTO price_history (shop_id, item_id, old_price, new_price, source, recorded_at)
                VALUES ($1, $2, $3, $4, 'sync', $5)
                ",
            )
            .bind(shop_id)
            .bind(item.item_id)
            .bind(previous_price)
            .bind(item.current_price)
            .bind(synced_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(if inserted {
            MergeOutcome::Inserted
        } else {
            MergeOutcome::Updated
        })
    }

    /// Count items mirrored for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, shop_id: ShopId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_items WHERE shop_id = $1")
            .bind(shop_id)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
