//! Storage for the sync engine.
//!
//! # Tables
//!
//! - `shop_credentials` - Marketplace access/refresh tokens, one row per shop
//! - `catalog_items` - Local mirror of each shop's catalog, keyed by `(shop_id, item_id)`
//! - `sync_runs` - Append-only audit log, one row per sync invocation
//! - `price_history` - Price changes appended during merges
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p marketsync-cli -- migrate
//! ```
//!
//! The engine talks to storage through the [`SyncStore`] trait. [`PgSyncStore`]
//! is the production implementation; an in-memory store is available behind
//! the `memory-store` feature for tests.

pub mod catalog;
pub mod credentials;
#[cfg(any(test, feature = "memory-store"))]
pub mod memory;
pub mod sync_runs;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketsync_core::ShopId;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::{CatalogItem, CatalogItemRepository, CatalogItemUpsert, MergeOutcome};
pub use credentials::{CredentialRepository, ShopCredential, TokenUpdate};
#[cfg(any(test, feature = "memory-store"))]
pub use memory::MemoryStore;
pub use sync_runs::{NewSyncRun, SyncRun, SyncRunRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Storage operations used by the sync engine.
///
/// Implementations must make `upsert_item` and `update_tokens` atomic.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Check that storage is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Load the credential for a shop.
    async fn get_credential(
        &self,
        shop_id: ShopId,
    ) -> Result<Option<ShopCredential>, RepositoryError>;

    /// Replace both tokens and both expiries of a shop credential in one update.
    ///
    /// Returns `false` if the shop has no credential row.
    async fn update_tokens(
        &self,
        shop_id: ShopId,
        update: &TokenUpdate<'_>,
    ) -> Result<bool, RepositoryError>;

    /// Insert or update the remote-owned columns of a catalog item.
    async fn upsert_item(
        &self,
        shop_id: ShopId,
        item: &CatalogItemUpsert,
        synced_at: DateTime<Utc>,
    ) -> Result<MergeOutcome, RepositoryError>;

    /// Append a sync run record.
    async fn insert_sync_run(&self, run: &NewSyncRun) -> Result<SyncRun, RepositoryError>;

    /// Most recent sync runs for a shop, newest first.
    async fn recent_sync_runs(
        &self,
        shop_id: ShopId,
        limit: i64,
    ) -> Result<Vec<SyncRun>, RepositoryError>;
}

/// `PostgreSQL`-backed [`SyncStore`].
#[derive(Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_credential(
        &self,
        shop_id: ShopId,
    ) -> Result<Option<ShopCredential>, RepositoryError> {
        CredentialRepository::new(&self.pool).get(shop_id).await
    }

    async fn update_tokens(
        &self,
        shop_id: ShopId,
        update: &TokenUpdate<'_>,
    ) -> Result<bool, RepositoryError> {
        CredentialRepository::new(&self.pool)
            .update_tokens(shop_id, update)
            .await
    }

    async fn upsert_item(
        &self,
        shop_id: ShopId,
        item: &CatalogItemUpsert,
        synced_at: DateTime<Utc>,
    ) -> Result<MergeOutcome, RepositoryError> {
        CatalogItemRepository::new(&self.pool)
            .upsert(shop_id, item, synced_at)
            .await
    }

    async fn insert_sync_run(&self, run: &NewSyncRun) -> Result<SyncRun, RepositoryError> {
        SyncRunRepository::new(&self.pool).insert(run).await
    }

    async fn recent_sync_runs(
        &self,
        shop_id: ShopId,
        limit: i64,
    ) -> Result<Vec<SyncRun>, RepositoryError> {
        SyncRunRepository::new(&self.pool)
            .recent(shop_id, limit)
            .await
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
