//! Shop credential repository.
//!
//! Stores the marketplace access and refresh tokens for each shop. Rows are
//! created by the authorization handshake (or `marketsync token import`) and
//! rotated by the token lifecycle manager.

use chrono::{DateTime, Utc};
use marketsync_core::{ShopId, TokenState};
use secrecy::SecretString;
use sqlx::PgPool;

use super::RepositoryError;

// =============================================================================
// Types
// =============================================================================

/// A shop's marketplace credential.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone)]
pub struct ShopCredential {
    /// Marketplace shop ID.
    pub shop_id: ShopId,
    /// Short-lived access token.
    pub access_token: SecretString,
    /// Refresh token, if the handshake produced one.
    pub refresh_token: Option<SecretString>,
    /// When the access token stops being accepted.
    pub access_token_expires_at: DateTime<Utc>,
    /// Locally computed refresh token expiry (best effort).
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    /// Last time the row was written.
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShopCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopCredential")
            .field("shop_id", &self.shop_id)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl ShopCredential {
    /// Validity of this credential at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        TokenState::classify(
            now,
            self.access_token_expires_at,
            self.refresh_token.is_some(),
            self.refresh_token_expires_at,
        )
    }

    /// Whether the access token expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.checked_add_signed(window)
            .is_none_or(|edge| edge >= self.access_token_expires_at)
    }

    /// Whether a refresh token is on file and not known to be expired.
    #[must_use]
    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_some()
            && self
                .refresh_token_expires_at
                .is_none_or(|expires_at| now < expires_at)
    }
}

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ShopCredentialRow {
    shop_id: ShopId,
    access_token: String,
    refresh_token: Option<String>,
    access_token_expires_at: DateTime<Utc>,
    refresh_token_expires_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<ShopCredentialRow> for ShopCredential {
    fn from(row: ShopCredentialRow) -> Self {
        Self {
            shop_id: row.shop_id,
            access_token: SecretString::from(row.access_token),
            refresh_token: row.refresh_token.map(SecretString::from),
            access_token_expires_at: row.access_token_expires_at,
            refresh_token_expires_at: row.refresh_token_expires_at,
            updated_at: row.updated_at,
        }
    }
}

/// New token values written after a refresh exchange.
#[derive(Debug, Clone, Copy)]
pub struct TokenUpdate<'a> {
    /// New access token.
    pub access_token: &'a str,
    /// New (or carried-over) refresh token.
    pub refresh_token: Option<&'a str>,
    /// Access token expiry.
    pub access_token_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    /// Time of the refresh, stored as `updated_at`.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shop credential database operations.
pub struct CredentialRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CredentialRepository<'a> {
    /// Create a new credential repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the credential for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, shop_id: ShopId) -> Result<Option<ShopCredential>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopCredentialRow>(
            r"
            SELECT
                shop_id,
                access_token,
                refresh_token,
                access_token_expires_at,
                refresh_token_expires_at,
                updated_at
            FROM shop_credentials
            WHERE shop_id = $1
            ",
        )
        .bind(shop_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShopCredential::from))
    }

    /// Save or replace the credential for a shop.
    ///
    /// Used when importing a credential from an authorization handshake.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(
        &self,
        shop_id: ShopId,
        update: &TokenUpdate<'_>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop_credentials (
                shop_id,
                access_token,
                refresh_token,
                access_token_expires_at,
                refresh_token_expires_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(shop_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                access_token_expires_at = EXCLUDED.access_token_expires_at,
                refresh_token_expires_at = EXCLUDED.refresh_token_expires_at,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(shop_id)
        .bind(update.access_token)
        .bind(update.refresh_token)
        .bind(update.access_token_expires_at)
        .bind(update.refresh_token_expires_at)
        .bind(update.updated_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Update both tokens and both expiries after a refresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_tokens(
        &self,
        shop_id: ShopId,
        update: &TokenUpdate<'_>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop_credentials
            SET
                access_token = $2,
                refresh_token = $3,
                access_token_expires_at = $4,
                refresh_token_expires_at = $5,
                updated_at = $6
            WHERE shop_id = $1
            ",
        )
        .bind(shop_id)
        .bind(update.access_token)
        .bind(update.refresh_token)
        .bind(update.access_token_expires_at)
        .bind(update.refresh_token_expires_at)
        .bind(update.updated_at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn credential(access_in: Duration, refresh: Option<Duration>) -> ShopCredential {
        let now = Utc::now();
        ShopCredential {
            shop_id: ShopId::new(9001),
            access_token: SecretString::from("access"),
            refresh_token: refresh.map(|_| SecretString::from("refresh")),
            access_token_expires_at: now + access_in,
            refresh_token_expires_at: refresh.map(|d| now + d),
            updated_at: now,
        }
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let cred = credential(Duration::hours(4), Some(Duration::days(30)));
        let debug = format!("{cred:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("\"access\""));
        assert!(!debug.contains("\"refresh\""));
    }

    #[test]
    fn test_state_at() {
        let now = Utc::now();
        assert_eq!(
            credential(Duration::hours(4), None).state_at(now),
            TokenState::Valid
        );
        assert_eq!(
            credential(Duration::hours(-1), Some(Duration::days(29))).state_at(now),
            TokenState::Expired
        );
        assert_eq!(
            credential(Duration::hours(-1), None).state_at(now),
            TokenState::Unrecoverable
        );
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let cred = credential(Duration::seconds(30), None);
        assert!(cred.expires_within(now, Duration::seconds(60)));
        assert!(!cred.expires_within(now, Duration::seconds(10)));
        assert!(cred.expires_within(now, Duration::MAX));
    }

    #[test]
    fn test_can_refresh() {
        let now = Utc::now();
        assert!(credential(Duration::hours(-1), Some(Duration::days(1))).can_refresh(now));
        assert!(!credential(Duration::hours(-1), Some(Duration::days(-1))).can_refresh(now));
        assert!(!credential(Duration::hours(4), None).can_refresh(now));
    }
}
