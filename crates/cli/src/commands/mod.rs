//! CLI command implementations.
//!
//! # Environment Variables
//!
//! - `MARKETSYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MARKETPLACE_PARTNER_ID` / `MARKETPLACE_PARTNER_KEY` - needed by `sync` and `token refresh`
//! - `SYNC_*` / `REFRESH_TOKEN_TTL_DAYS` - engine tuning, same as the server

pub mod migrate;
pub mod sync;
pub mod token;

use marketsync_server::ConfigError;
use marketsync_server::config::get_database_url;
use marketsync_server::db::{self, PgSyncStore, RepositoryError};
use marketsync_server::marketplace::MarketplaceError;
use marketsync_server::sync::SyncError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository query failed.
    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    /// Marketplace client could not be built.
    #[error("marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),

    /// The sync engine rejected the operation.
    #[error("{0}")]
    Sync(#[from] SyncError),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No credential stored for the shop.
    #[error("no credential on file for shop {0}")]
    NoCredential(i64),
}

/// Load `.env` and connect to the sync database.
async fn connect() -> Result<PgSyncStore, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("MARKETSYNC_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgSyncStore::new(pool))
}

/// Reject non-positive shop ids before touching the database.
fn check_shop_id(shop_id: i64) -> Result<marketsync_core::ShopId, CommandError> {
    if shop_id <= 0 {
        return Err(CommandError::InvalidArgument(format!(
            "shop id must be positive, got {shop_id}"
        )));
    }
    Ok(marketsync_core::ShopId::new(shop_id))
}
