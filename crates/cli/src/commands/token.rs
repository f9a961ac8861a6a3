//! Shop credential commands.
//!
//! # Usage
//!
//! ```bash
//! # Store tokens from the authorization handshake
//! marketsync token import -s 9001 -a <access> -r <refresh> -e 14400
//!
//! # Show token state
//! marketsync token status -s 9001
//!
//! # Force a refresh exchange
//! marketsync token refresh -s 9001
//! ```

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use marketsync_server::config::{MarketplaceConfig, sync_settings_from_env};
use marketsync_server::db::{CredentialRepository, SyncStore, TokenUpdate};
use marketsync_server::marketplace::MarketplaceClient;
use marketsync_server::marketplace::auth::MAX_ACCESS_TOKEN_LIFETIME_SECS;
use marketsync_server::sync::TokenManager;

use super::{CommandError, check_shop_id, connect};

/// Show a shop's token state and expiries. Tokens are never printed.
///
/// # Errors
///
/// Returns `CommandError::NoCredential` if nothing is stored for the shop.
pub async fn status(shop_id: i64) -> Result<(), CommandError> {
    let shop = check_shop_id(shop_id)?;
    let store = connect().await?;

    let credential = store
        .get_credential(shop)
        .await?
        .ok_or(CommandError::NoCredential(shop_id))?;
    let now = Utc::now();

    tracing::info!(
        shop_id = %shop,
        state = %credential.state_at(now),
        can_refresh = credential.can_refresh(now),
        access_token_expires_at = %credential.access_token_expires_at,
        refresh_token_expires_at = ?credential.refresh_token_expires_at,
        "Credential status"
    );
    Ok(())
}

/// Exchange the refresh token for a new access token.
///
/// # Errors
///
/// Returns `CommandError::Sync` if the shop cannot be refreshed.
pub async fn refresh(shop_id: i64) -> Result<(), CommandError> {
    let shop = check_shop_id(shop_id)?;
    let store = connect().await?;

    let marketplace = MarketplaceConfig::from_env()?;
    let settings = sync_settings_from_env()?;
    let client = MarketplaceClient::new(&marketplace)?;

    let tokens = TokenManager::new(Arc::new(store), client, settings.tokens);
    let credential = tokens.refresh_shop(shop).await?;

    tracing::info!(
        shop_id = %shop,
        access_token_expires_at = %credential.access_token_expires_at,
        "Access token refreshed"
    );
    Ok(())
}

/// Save or replace the credential for a shop.
///
/// The refresh token expiry is assumed from `REFRESH_TOKEN_TTL_DAYS`.
///
/// # Errors
///
/// Returns `CommandError::InvalidArgument` for a blank token or a lifetime
/// outside one second to one year.
pub async fn import(
    shop_id: i64,
    access_token: String,
    refresh_token: Option<String>,
    expire_in: i64,
) -> Result<(), CommandError> {
    let shop = check_shop_id(shop_id)?;
    if access_token.trim().is_empty() {
        return Err(CommandError::InvalidArgument(
            "access token must not be blank".to_string(),
        ));
    }
    let lifetime = access_token_lifetime(expire_in)?;
    let refresh_token = refresh_token.filter(|t| !t.trim().is_empty());

    let store = connect().await?;
    let settings = sync_settings_from_env()?;

    let now = Utc::now();
    let update = TokenUpdate {
        access_token: &access_token,
        refresh_token: refresh_token.as_deref(),
        access_token_expires_at: expiry(now, lifetime)?,
        refresh_token_expires_at: refresh_token
            .as_ref()
            .map(|_| expiry(now, settings.tokens.refresh_token_ttl))
            .transpose()?,
        updated_at: now,
    };
    CredentialRepository::new(store.pool())
        .save(shop, &update)
        .await?;

    tracing::info!(shop_id = %shop, "Credential imported");
    Ok(())
}

fn access_token_lifetime(expire_in: i64) -> Result<TimeDelta, CommandError> {
    if !(1..=MAX_ACCESS_TOKEN_LIFETIME_SECS).contains(&expire_in) {
        return Err(CommandError::InvalidArgument(format!(
            "expire_in must be between 1 and {MAX_ACCESS_TOKEN_LIFETIME_SECS} seconds, got {expire_in}"
        )));
    }
    TimeDelta::try_seconds(expire_in).ok_or_else(|| {
        CommandError::InvalidArgument(format!("expire_in {expire_in} overflows"))
    })
}

fn expiry(now: DateTime<Utc>, lifetime: TimeDelta) -> Result<DateTime<Utc>, CommandError> {
    now.checked_add_signed(lifetime).ok_or_else(|| {
        CommandError::InvalidArgument(format!("expiry overflows {now} + {lifetime}"))
    })
}
