//! Token lifecycle management.
//!
//! A credential is `Valid` while its access token is unexpired, `Expired`
//! when only the refresh token is still live, and `Unrecoverable` otherwise.
//! Refreshing moves `Expired` back to `Valid` by persisting the new tokens
//! and expiries in one update. A rejected refresh is fatal: the shop must be
//! re-authorized.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeDelta, Utc};
use marketsync_core::{DEFAULT_REFRESH_TOKEN_TTL_DAYS, ShopId, TokenState};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use super::SyncError;
use crate::db::{RepositoryError, ShopCredential, SyncStore, TokenUpdate};
use crate::marketplace::MarketplaceClient;

/// Refresh timing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Assumed lifetime of a newly issued refresh token.
    pub refresh_token_ttl: Duration,
    /// Refresh ahead of expiry when the access token has less than this left.
    pub refresh_skew: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            refresh_skew: Duration::seconds(60),
        }
    }
}

/// Keeps shop credentials usable.
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn SyncStore>,
    client: MarketplaceClient,
    policy: TokenPolicy,
}

impl TokenManager {
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, client: MarketplaceClient, policy: TokenPolicy) -> Self {
        Self {
            store,
            client,
            policy,
        }
    }

    /// Load a shop's credential, refreshing it if needed.
    ///
    /// A still-valid token inside the refresh skew window is refreshed
    /// opportunistically; if that refresh fails the current token is returned.
    ///
    /// # Errors
    ///
    /// - `SyncError::Auth` if the shop has no credential
    /// - `SyncError::Refresh` if the credential is unrecoverable or the
    ///   marketplace rejects the refresh
    /// - `SyncError::Storage` if loading or persisting fails
    #[instrument(skip(self), fields(shop_id = %shop_id))]
    pub async fn ensure_valid(&self, shop_id: ShopId) -> Result<ShopCredential, SyncError> {
        let credential = self.load(shop_id).await?;
        let now = Utc::now();

        match credential.state_at(now) {
            TokenState::Valid => {
                if !credential.expires_within(now, self.policy.refresh_skew)
                    || !credential.can_refresh(now)
                {
                    return Ok(credential);
                }
                match self.refresh(&credential).await {
                    Ok(refreshed) => Ok(refreshed),
                    Err(SyncError::Storage(err)) => Err(SyncError::Storage(err)),
                    Err(err) => {
                        warn!(error = %err, "proactive refresh failed, using current token");
                        Ok(credential)
                    }
                }
            }
            TokenState::Expired => self.refresh(&credential).await,
            TokenState::Unrecoverable => Err(SyncError::Refresh {
                shop_id,
                reason: "refresh token missing or expired, re-authorization required".to_string(),
            }),
        }
    }

    /// Refresh a shop's credential regardless of its access token expiry.
    ///
    /// # Errors
    ///
    /// Same as [`Self::ensure_valid`].
    #[instrument(skip(self), fields(shop_id = %shop_id))]
    pub async fn refresh_shop(&self, shop_id: ShopId) -> Result<ShopCredential, SyncError> {
        let credential = self.load(shop_id).await?;
        self.refresh(&credential).await
    }

    /// Exchange the credential's refresh token and persist the result.
    ///
    /// The previous refresh token is kept when the marketplace does not
    /// rotate it.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Refresh` if there is no refresh token or the
    /// exchange fails, and `SyncError::Storage` if persisting fails.
    pub async fn refresh(&self, credential: &ShopCredential) -> Result<ShopCredential, SyncError> {
        let shop_id = credential.shop_id;
        let now = Utc::now();

        let Some(current_refresh) = credential
            .refresh_token
            .as_ref()
            .filter(|_| credential.can_refresh(now))
        else {
            return Err(SyncError::Refresh {
                shop_id,
                reason: "refresh token missing or expired, re-authorization required".to_string(),
            });
        };

        let grant = self
            .client
            .refresh_access_token(shop_id, current_refresh)
            .await
            .map_err(|err| SyncError::Refresh {
                shop_id,
                reason: err.to_string(),
            })?;

        let issued_at = Utc::now();
        let access_token_expires_at = TimeDelta::try_seconds(grant.expire_in)
            .and_then(|lifetime| offset(shop_id, issued_at, lifetime).ok())
            .ok_or_else(|| SyncError::Refresh {
                shop_id,
                reason: format!("unusable access token lifetime {}s", grant.expire_in),
            })?;
        let (refresh_token, refresh_token_expires_at): (SecretString, _) = match grant.refresh_token
        {
            Some(rotated) => (
                rotated,
                Some(offset(shop_id, issued_at, self.policy.refresh_token_ttl)?),
            ),
            None => (
                current_refresh.clone(),
                credential.refresh_token_expires_at,
            ),
        };

        let refreshed = ShopCredential {
            shop_id,
            access_token: grant.access_token,
            refresh_token: Some(refresh_token),
            access_token_expires_at,
            refresh_token_expires_at,
            updated_at: issued_at,
        };

        let update = TokenUpdate {
            access_token: refreshed.access_token.expose_secret(),
            refresh_token: refreshed
                .refresh_token
                .as_ref()
                .map(|token| token.expose_secret()),
            access_token_expires_at: refreshed.access_token_expires_at,
            refresh_token_expires_at: refreshed.refresh_token_expires_at,
            updated_at: refreshed.updated_at,
        };

        if !self.store.update_tokens(shop_id, &update).await? {
            return Err(SyncError::Storage(RepositoryError::NotFound));
        }

        info!(
            expires_at = %refreshed.access_token_expires_at,
            "refreshed shop access token"
        );
        Ok(refreshed)
    }

    async fn load(&self, shop_id: ShopId) -> Result<ShopCredential, SyncError> {
        self.store
            .get_credential(shop_id)
            .await?
            .ok_or_else(|| SyncError::Auth(format!("no credential on file for shop {shop_id}")))
    }
}

fn offset(
    shop_id: ShopId,
    from: DateTime<Utc>,
    by: TimeDelta,
) -> Result<DateTime<Utc>, SyncError> {
    from.checked_add_signed(by).ok_or_else(|| SyncError::Refresh {
        shop_id,
        reason: format!("token expiry overflows {from} + {by}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration as StdDuration;

    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::config::MarketplaceConfig;
    use crate::db::MemoryStore;
    use crate::marketplace::auth::REFRESH_PATH;

    const SHOP: ShopId = ShopId::new(9001);

    fn manager(server: &MockServer, store: Arc<MemoryStore>) -> TokenManager {
        let client = MarketplaceClient::new(&MarketplaceConfig {
            base_url: Url::parse(&server.base_url()).unwrap(),
            partner_id: 2_001_234,
            partner_key: SecretString::from("k3y-For-Tests-0nly"),
            timeout: StdDuration::from_secs(5),
        })
        .unwrap();
        TokenManager::new(store, client, TokenPolicy::default())
    }

    fn credential(access_in: Duration, refresh_in: Option<Duration>) -> ShopCredential {
        let now = Utc::now();
        ShopCredential {
            shop_id: SHOP,
            access_token: SecretString::from("access-1"),
            refresh_token: refresh_in.map(|_| SecretString::from("refresh-1")),
            access_token_expires_at: now + access_in,
            refresh_token_expires_at: refresh_in.map(|d| now + d),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_refresh() {
        let server = MockServer::start_async().await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST).path(REFRESH_PATH);
                then.status(200);
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        store
            .put_credential(credential(Duration::hours(4), Some(Duration::days(20))))
            .unwrap();

        let cred = manager(&server, store).ensure_valid(SHOP).await.unwrap();

        assert_eq!(cred.access_token.expose_secret(), "access-1");
        assert_eq!(refresh.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(REFRESH_PATH);
                then.status(200).json_body(json!({
                    "access_token": "access-2",
                    "refresh_token": "refresh-2",
                    "expire_in": 14_400
                }));
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        store
            .put_credential(credential(Duration::hours(-1), Some(Duration::days(20))))
            .unwrap();

        let before = Utc::now();
        let cred = manager(&server, store.clone())
            .ensure_valid(SHOP)
            .await
            .unwrap();

        assert_eq!(cred.state_at(Utc::now()), TokenState::Valid);
        assert!(cred.access_token_expires_at >= before + Duration::seconds(14_400));

        let stored = store.get_credential(SHOP).await.unwrap().unwrap();
        assert_eq!(stored.access_token.expose_secret(), "access-2");
        assert_eq!(
            stored.refresh_token.as_ref().map(|t| t.expose_secret()),
            Some("refresh-2")
        );
        let refresh_expiry = stored.refresh_token_expires_at.unwrap();
        assert!(refresh_expiry >= before + Duration::days(30));
    }

    #[tokio::test]
    async fn test_unrotated_refresh_token_is_kept() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(REFRESH_PATH);
                then.status(200)
                    .json_body(json!({"access_token": "access-2", "expire_in": 3600}));
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        let original = credential(Duration::hours(-1), Some(Duration::days(5)));
        let original_refresh_expiry = original.refresh_token_expires_at;
        store.put_credential(original).unwrap();

        let cred = manager(&server, store).ensure_valid(SHOP).await.unwrap();

        assert_eq!(
            cred.refresh_token.as_ref().map(|t| t.expose_secret()),
            Some("refresh-1")
        );
        assert_eq!(cred.refresh_token_expires_at, original_refresh_expiry);
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(REFRESH_PATH);
                then.status(200)
                    .json_body(json!({"error": "error_auth", "message": "invalid refresh_token"}));
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        store
            .put_credential(credential(Duration::hours(-1), Some(Duration::days(5))))
            .unwrap();

        let err = manager(&server, store.clone())
            .ensure_valid(SHOP)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Refresh { .. }));
        let stored = store.get_credential(SHOP).await.unwrap().unwrap();
        assert_eq!(stored.access_token.expose_secret(), "access-1");
    }

    #[tokio::test]
    async fn test_oversized_lifetime_is_a_refresh_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(REFRESH_PATH);
                then.status(200).json_body(json!({
                    "access_token": "access-2",
                    "refresh_token": "refresh-2",
                    "expire_in": 9_000_000_000_000_000_i64
                }));
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        store
            .put_credential(credential(Duration::hours(-1), Some(Duration::days(5))))
            .unwrap();

        let err = manager(&server, store.clone())
            .ensure_valid(SHOP)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Refresh { ref reason, .. } if reason.contains("expire_in")));
        let stored = store.get_credential(SHOP).await.unwrap().unwrap();
        assert_eq!(stored.access_token.expose_secret(), "access-1");
    }

    #[test]
    fn test_expiry_overflow_is_reported() {
        let err = offset(SHOP, DateTime::<Utc>::MAX_UTC, TimeDelta::days(1)).unwrap_err();
        assert!(matches!(err, SyncError::Refresh { shop_id, .. } if shop_id == SHOP));
    }

    #[tokio::test]
    async fn test_unrecoverable_credential_skips_remote() {
        let server = MockServer::start_async().await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST).path(REFRESH_PATH);
                then.status(200);
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        store
            .put_credential(credential(Duration::hours(-1), Some(Duration::days(-1))))
            .unwrap();

        let err = manager(&server, store).ensure_valid(SHOP).await.unwrap_err();

        assert!(matches!(err, SyncError::Refresh { .. }));
        assert_eq!(refresh.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_failed_proactive_refresh_falls_back_to_current_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(REFRESH_PATH);
                then.status(503).body("unavailable");
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        store
            .put_credential(credential(Duration::seconds(20), Some(Duration::days(5))))
            .unwrap();

        let cred = manager(&server, store).ensure_valid(SHOP).await.unwrap();

        assert_eq!(cred.access_token.expose_secret(), "access-1");
    }

    #[tokio::test]
    async fn test_missing_credential_is_auth_error() {
        let server = MockServer::start_async().await;
        let store = Arc::new(MemoryStore::new());

        let err = manager(&server, store).ensure_valid(SHOP).await.unwrap_err();

        assert!(matches!(err, SyncError::Auth(_)));
    }
}
