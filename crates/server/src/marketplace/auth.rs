//! Access token refresh exchange.
//!
//! The exchange is a public call: it is signed with partner credentials only
//! and carries the shop id and refresh token in the JSON body. Unlike shop
//! endpoints the response is not wrapped in an envelope.

use chrono::Utc;
use marketsync_core::ShopId;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use super::sign::Signer;
use super::types::{RefreshRequest, RefreshResponse};
use super::{MarketplaceError, truncate_body};

/// Token refresh endpoint.
pub const REFRESH_PATH: &str = "/api/v2/auth/access_token/get";

/// Longest access token lifetime accepted from a refresh response (one year).
pub const MAX_ACCESS_TOKEN_LIFETIME_SECS: i64 = 31_536_000;

/// Tokens issued by a successful refresh exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// New access token.
    pub access_token: SecretString,
    /// New refresh token, if the marketplace rotated it.
    pub refresh_token: Option<SecretString>,
    /// Access token lifetime in seconds, within
    /// `1..=MAX_ACCESS_TOKEN_LIFETIME_SECS`.
    pub expire_in: i64,
}

/// Exchange a refresh token for a new access token.
///
/// # Errors
///
/// Returns `MarketplaceError::Api` if the marketplace rejects the refresh
/// token, `MarketplaceError::MalformedResponse` if a success response lacks
/// the new token or carries a missing or out-of-range lifetime, and `MarketplaceError::Http`/`Status` on
/// transport failures.
#[instrument(skip(client, base_url, signer, refresh_token), fields(shop_id = %shop_id))]
pub async fn refresh_access_token(
    client: &reqwest::Client,
    base_url: &Url,
    signer: &Signer,
    shop_id: ShopId,
    refresh_token: &SecretString,
) -> Result<TokenGrant, MarketplaceError> {
    let timestamp = Utc::now().timestamp();
    let sign = signer.sign(REFRESH_PATH, timestamp, None, None)?;
    let url = base_url.join(REFRESH_PATH)?;

    let response = client
        .post(url)
        .query(&[
            ("partner_id", signer.partner_id().to_string()),
            ("timestamp", timestamp.to_string()),
            ("sign", sign),
        ])
        .json(&RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
            shop_id: shop_id.as_i64(),
            partner_id: signer.partner_id(),
        })
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    let parsed = serde_json::from_str::<RefreshResponse>(&body);

    if let Ok(payload) = &parsed
        && !payload.error.is_empty()
    {
        return Err(MarketplaceError::Api {
            code: payload.error.clone(),
            message: payload.message.clone(),
        });
    }

    if !status.is_success() {
        return Err(MarketplaceError::Status {
            status: status.as_u16(),
            body: truncate_body(body),
        });
    }

    let payload = parsed?;
    let access_token = payload
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            MarketplaceError::MalformedResponse("refresh response has no access_token".into())
        })?;
    let expire_in = payload.expire_in.ok_or_else(|| {
        MarketplaceError::MalformedResponse("refresh response has no expire_in".into())
    })?;
    if !(1..=MAX_ACCESS_TOKEN_LIFETIME_SECS).contains(&expire_in) {
        return Err(MarketplaceError::MalformedResponse(format!(
            "refresh response expire_in {expire_in} is out of range"
        )));
    }

    Ok(TokenGrant {
        access_token: SecretString::from(access_token),
        refresh_token: payload
            .refresh_token
            .filter(|token| !token.is_empty())
            .map(SecretString::from),
        expire_in,
    })
}
