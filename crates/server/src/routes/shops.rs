//! Shop credential endpoints.
//!
//! Tokens themselves are never returned; only their state and expiries.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use marketsync_core::{ShopId, TokenState};
use serde::Serialize;

use super::ApiResponse;
use crate::db::ShopCredential;
use crate::error::AppError;
use crate::state::AppState;
use crate::sync::SyncError;

/// Public view of a shop credential.
#[derive(Debug, Serialize)]
pub struct CredentialStatus {
    pub shop_id: ShopId,
    pub state: TokenState,
    pub can_refresh: bool,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialStatus {
    #[must_use]
    pub fn from_credential(credential: &ShopCredential, now: DateTime<Utc>) -> Self {
        Self {
            shop_id: credential.shop_id,
            state: credential.state_at(now),
            can_refresh: credential.can_refresh(now),
            access_token_expires_at: credential.access_token_expires_at,
            refresh_token_expires_at: credential.refresh_token_expires_at,
            updated_at: credential.updated_at,
        }
    }
}

/// Show a shop's token state.
pub async fn credential_status(
    State(state): State<AppState>,
    Path(shop_id): Path<i64>,
) -> Result<Json<ApiResponse<CredentialStatus>>, AppError> {
    let shop_id = ShopId::new(shop_id);
    let credential = state
        .store()
        .get_credential(shop_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no credential for shop {shop_id}")))?;

    let status = CredentialStatus::from_credential(&credential, Utc::now());
    Ok(Json(ApiResponse::success(
        format!("Access token is {}", status.state),
        status,
    )))
}

/// Force a token refresh for a shop.
pub async fn refresh_credential(
    State(state): State<AppState>,
    Path(shop_id): Path<i64>,
) -> Result<Json<ApiResponse<CredentialStatus>>, AppError> {
    let shop_id = ShopId::new(shop_id);
    let credential = state
        .tokens()
        .refresh_shop(shop_id)
        .await
        .map_err(|err| match err {
            SyncError::Auth(message) => AppError::NotFound(message),
            other => AppError::from(other),
        })?;

    Ok(Json(ApiResponse::success(
        "Access token refreshed",
        CredentialStatus::from_credential(&credential, Utc::now()),
    )))
}
