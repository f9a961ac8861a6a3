//! Catalog sync endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use marketsync_core::{ShopId, SyncRunId, SyncStatus};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::db::SyncRun;
use crate::error::AppError;
use crate::state::AppState;
use crate::sync::SyncSummary;

const DEFAULT_RUNS_LIMIT: i64 = 20;
const MAX_RUNS_LIMIT: i64 = 100;

/// Query parameters for `POST /api/sync/catalog`.
#[derive(Debug, Deserialize)]
pub struct SyncCatalogQuery {
    pub shop_id: Option<String>,
    pub access_token: Option<String>,
}

/// Query parameters for `GET /api/sync/runs`.
#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub shop_id: Option<String>,
    pub limit: Option<i64>,
}

/// `data` payload of a finished sync.
#[derive(Debug, Serialize)]
pub struct SyncCatalogData {
    #[serde(flatten)]
    pub summary: SyncSummary,
    pub run_id: SyncRunId,
    pub run_status: SyncStatus,
}

/// Parse a required, non-blank shop id parameter.
fn require_shop_id(raw: Option<&str>) -> Result<ShopId, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("shop_id is required".to_string()))?;
    raw.parse::<ShopId>()
        .ok()
        .filter(|id| id.as_i64() > 0)
        .ok_or_else(|| AppError::BadRequest(format!("invalid shop_id: {raw}")))
}

/// Run a full catalog sync for one shop.
///
/// Rejects missing parameters before any remote call is made. A run recorded
/// as failed is reported with an error envelope that still carries its counts.
pub async fn sync_catalog(
    State(state): State<AppState>,
    Query(query): Query<SyncCatalogQuery>,
) -> Result<Json<ApiResponse<SyncCatalogData>>, AppError> {
    let shop_id = require_shop_id(query.shop_id.as_deref())?;
    let access_token = query
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("access_token is required".to_string()))?;

    let outcome = state.orchestrator().run_sync(shop_id, access_token).await?;

    let summary = outcome.summary;
    let message = match outcome.status {
        SyncStatus::Success => format!("Synced {} items", summary.synced),
        SyncStatus::Partial => format!(
            "Synced {} items, {} failed",
            summary.synced, summary.failed
        ),
        SyncStatus::Failed => outcome
            .error_message
            .unwrap_or_else(|| format!("Sync failed, {} items failed", summary.failed)),
    };

    let data = SyncCatalogData {
        summary,
        run_id: outcome.run_id,
        run_status: outcome.status,
    };
    let envelope = if outcome.status == SyncStatus::Failed {
        ApiResponse::error(message, data)
    } else {
        ApiResponse::success(message, data)
    };
    Ok(Json(envelope))
}

/// List recent sync runs for a shop, newest first.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<SyncRun>>>, AppError> {
    let shop_id = require_shop_id(query.shop_id.as_deref())?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RUNS_LIMIT)
        .clamp(1, MAX_RUNS_LIMIT);

    let runs = state.store().recent_sync_runs(shop_id, limit).await?;

    Ok(Json(ApiResponse::success(
        format!("{} runs", runs.len()),
        runs,
    )))
}
