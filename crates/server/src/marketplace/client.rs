//! Marketplace catalog API client.
//!
//! Provides signed access to the two catalog endpoints used by the crawl
//! (`get_item_list` and `get_item_base_info`) and the token refresh exchange.

use std::sync::Arc;

use chrono::Utc;
use marketsync_core::{ItemId, ItemStatus, ShopId};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::auth::{self, TokenGrant};
use super::sign::Signer;
use super::types::{ApiEnvelope, ItemDetailPage, ItemListPage};
use super::{MarketplaceError, truncate_body};
use crate::config::MarketplaceConfig;

/// Item id listing endpoint.
pub const ITEM_LIST_PATH: &str = "/api/v2/product/get_item_list";

/// Item detail endpoint.
pub const ITEM_DETAIL_PATH: &str = "/api/v2/product/get_item_base_info";

/// Marketplace API client.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct MarketplaceClient {
    inner: Arc<MarketplaceClientInner>,
}

struct MarketplaceClientInner {
    client: reqwest::Client,
    base_url: Url,
    signer: Signer,
}

impl MarketplaceClient {
    /// Create a client for the configured partner application.
    ///
    /// # Errors
    ///
    /// Returns `MarketplaceError::Http` if the HTTP client cannot be built.
    pub fn new(config: &MarketplaceConfig) -> Result<Self, MarketplaceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(MarketplaceClientInner {
                client,
                base_url: config.base_url.clone(),
                signer: Signer::new(config.partner_id, config.partner_key.clone()),
            }),
        })
    }

    /// The partner ID requests are signed for.
    #[must_use]
    pub fn partner_id(&self) -> i64 {
        self.inner.signer.partner_id()
    }

    /// List one page of item ids.
    ///
    /// # Errors
    ///
    /// Returns `MarketplaceError::Api` if the marketplace rejects the call,
    /// `MarketplaceError::MalformedResponse` if the payload is missing, and
    /// `MarketplaceError::Http`/`Status` on transport failures.
    #[instrument(skip(self, access_token, statuses), fields(shop_id = %shop_id))]
    pub async fn get_item_list(
        &self,
        shop_id: ShopId,
        access_token: &SecretString,
        offset: i64,
        page_size: u32,
        statuses: &[ItemStatus],
    ) -> Result<ItemListPage, MarketplaceError> {
        let mut params = vec![
            ("offset", offset.to_string()),
            ("page_size", page_size.to_string()),
        ];
        params.extend(
            statuses
                .iter()
                .map(|status| ("item_status", status.as_str().to_string())),
        );

        let envelope: ApiEnvelope<ItemListPage> = self
            .get_shop(ITEM_LIST_PATH, shop_id, access_token, &params)
            .await?;

        envelope.response.ok_or_else(|| {
            MarketplaceError::MalformedResponse("get_item_list returned no response".to_string())
        })
    }

    /// Fetch full records for a batch of item ids.
    ///
    /// Returns `Ok(None)` when the response carries no `item_list`.
    ///
    /// # Errors
    ///
    /// Returns `MarketplaceError::Api` if the marketplace rejects the call and
    /// `MarketplaceError::Http`/`Status` on transport failures.
    #[instrument(skip(self, access_token, item_ids), fields(shop_id = %shop_id, batch = item_ids.len()))]
    pub async fn get_item_base_info(
        &self,
        shop_id: ShopId,
        access_token: &SecretString,
        item_ids: &[ItemId],
    ) -> Result<Option<Vec<serde_json::Value>>, MarketplaceError> {
        let id_list = item_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let envelope: ApiEnvelope<ItemDetailPage> = self
            .get_shop(
                ITEM_DETAIL_PATH,
                shop_id,
                access_token,
                &[("item_id_list", id_list)],
            )
            .await?;

        Ok(envelope.response.and_then(|page| page.item_list))
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `MarketplaceError::Api` if the refresh token is rejected.
    pub async fn refresh_access_token(
        &self,
        shop_id: ShopId,
        refresh_token: &SecretString,
    ) -> Result<TokenGrant, MarketplaceError> {
        auth::refresh_access_token(
            &self.inner.client,
            &self.inner.base_url,
            &self.inner.signer,
            shop_id,
            refresh_token,
        )
        .await
    }

    /// Issue a signed GET against a shop-level endpoint.
    async fn get_shop<T: DeserializeOwned>(
        &self,
        path: &str,
        shop_id: ShopId,
        access_token: &SecretString,
        params: &[(&str, String)],
    ) -> Result<ApiEnvelope<T>, MarketplaceError> {
        let timestamp = Utc::now().timestamp();
        let token = access_token.expose_secret();
        let sign = self
            .inner
            .signer
            .sign(path, timestamp, Some(token), Some(shop_id))?;

        let mut query: Vec<(&str, String)> = vec![
            ("partner_id", self.partner_id().to_string()),
            ("timestamp", timestamp.to_string()),
            ("sign", sign),
            ("access_token", token.to_string()),
            ("shop_id", shop_id.to_string()),
        ];
        query.extend_from_slice(params);

        let url = self.inner.base_url.join(path)?;
        let response = self.inner.client.get(url).query(&query).send().await?;

        decode_envelope(response).await
    }
}

/// Decode an enveloped response, turning error payloads into errors.
async fn decode_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<ApiEnvelope<T>, MarketplaceError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        // Rejections often arrive as 4xx with a regular error envelope.
        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
            && let Some(code) = envelope.error_code()
        {
            return Err(MarketplaceError::Api {
                code: code.to_string(),
                message: envelope.message.clone(),
            });
        }
        return Err(MarketplaceError::Status {
            status: status.as_u16(),
            body: truncate_body(body),
        });
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
    if let Some(code) = envelope.error_code() {
        return Err(MarketplaceError::Api {
            code: code.to_string(),
            message: envelope.message.clone(),
        });
    }

    Ok(envelope)
}
