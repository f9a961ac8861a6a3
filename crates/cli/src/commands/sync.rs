//! Catalog sync commands.
//!
//! # Usage
//!
//! ```bash
//! marketsync sync run --shop-id 9001
//! marketsync runs list --shop-id 9001 --limit 5
//! ```

use std::sync::Arc;

use marketsync_server::config::{MarketplaceConfig, sync_settings_from_env};
use marketsync_server::db::{CatalogItemRepository, SyncStore};
use marketsync_server::marketplace::MarketplaceClient;
use marketsync_server::sync::Orchestrator;
use secrecy::ExposeSecret;

use super::{CommandError, check_shop_id, connect};

/// Run a full catalog sync with the shop's stored credential.
///
/// # Errors
///
/// Returns `CommandError` if configuration is missing, the shop has no
/// credential, or the engine refuses to start the run.
pub async fn run(shop_id: i64) -> Result<(), CommandError> {
    let shop = check_shop_id(shop_id)?;
    let store = connect().await?;

    let marketplace = MarketplaceConfig::from_env()?;
    let settings = sync_settings_from_env()?;
    let client = MarketplaceClient::new(&marketplace)?;

    let credential = store
        .get_credential(shop)
        .await?
        .ok_or(CommandError::NoCredential(shop_id))?;

    let orchestrator = Orchestrator::new(Arc::new(store.clone()), client, settings);
    let outcome = orchestrator
        .run_sync(shop, credential.access_token.expose_secret())
        .await?;

    let mirrored = CatalogItemRepository::new(store.pool()).count(shop).await?;

    tracing::info!(
        run_id = %outcome.run_id,
        status = %outcome.status,
        total_fetched = outcome.summary.total_fetched,
        synced = outcome.summary.synced,
        failed = outcome.summary.failed,
        mirrored,
        "Sync finished"
    );
    if let Some(message) = &outcome.error_message {
        tracing::warn!("Run incomplete: {message}");
    }

    Ok(())
}

/// Print the most recent sync runs for a shop.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable.
pub async fn list_runs(shop_id: i64, limit: i64) -> Result<(), CommandError> {
    let shop = check_shop_id(shop_id)?;
    let store = connect().await?;

    let runs = store.recent_sync_runs(shop, limit.clamp(1, 100)).await?;
    if runs.is_empty() {
        tracing::info!("No sync runs recorded for shop {shop}");
        return Ok(());
    }

    #[allow(clippy::print_stdout)]
    for run in runs {
        println!(
            "#{id}  {started}  {status:<8} fetched={fetched} synced={synced} failed={failed}{error}",
            id = run.id,
            started = run.started_at.format("%Y-%m-%d %H:%M:%S"),
            status = run.status,
            fetched = run.total_fetched,
            synced = run.items_synced,
            failed = run.items_failed,
            error = run
                .error_message
                .map(|e| format!("  ({e})"))
                .unwrap_or_default(),
        );
    }

    Ok(())
}
