//! Sync run audit log.
//!
//! Rows are only ever inserted; there is no update or delete path.

use chrono::{DateTime, Utc};
use marketsync_core::{ShopId, SyncRunId, SyncStatus, SyncType};
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;

/// A recorded sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub shop_id: ShopId,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub items_synced: i64,
    pub items_failed: i64,
    pub total_fetched: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Parameters for appending a sync run.
#[derive(Debug, Clone)]
pub struct NewSyncRun {
    pub shop_id: ShopId,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub items_synced: i64,
    pub items_failed: i64,
    pub total_fetched: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Repository for sync run database operations.
pub struct SyncRunRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncRunRepository<'a> {
    /// Create a new sync run repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a run record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, run: &NewSyncRun) -> Result<SyncRun, RepositoryError> {
        let row = sqlx::query_as::<_, SyncRun>(
            r"
            INSERT INTO sync_runs (
                shop_id, sync_type, status, items_synced, items_failed,
                total_fetched, error_message, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING
                id, shop_id, sync_type, status, items_synced, items_failed,
                total_fetched, error_message, started_at, completed_at
            ",
        )
        .bind(run.shop_id)
        .bind(run.sync_type)
        .bind(run.status)
        .bind(run.items_synced)
        .bind(run.items_failed)
        .bind(run.total_fetched)
        .bind(&run.error_message)
        .bind(run.started_at)
        .bind(run.completed_at)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Most recent runs for a shop, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, shop_id: ShopId, limit: i64) -> Result<Vec<SyncRun>, RepositoryError> {
        let rows = sqlx::query_as::<_, SyncRun>(
            r"
            SELECT
                id, shop_id, sync_type, status, items_synced, items_failed,
                total_fetched, error_message, started_at, completed_at
            FROM sync_runs
            WHERE shop_id = $1
            ORDER BY started_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(shop_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
