//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! marketsync migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/`. The server never runs them
//! on startup.

use super::{CommandError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let store = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations")
        .run(store.pool())
        .await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
