//! Integration tests for marketsync.
//!
//! The engine runs against an in-memory store and an `httpmock` marketplace,
//! so these tests need no database or network access.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marketsync-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog_sync` - Crawl pagination, partial failures, idempotent merges
//! - `token_lifecycle` - Refresh transitions during a sync

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use httpmock::Method::{GET, POST};
use httpmock::{Mock, MockServer};
use marketsync_core::ShopId;
use marketsync_server::MarketplaceConfig;
use marketsync_server::db::{MemoryStore, ShopCredential};
use marketsync_server::marketplace::MarketplaceClient;
use marketsync_server::marketplace::auth::REFRESH_PATH;
use marketsync_server::marketplace::client::{ITEM_DETAIL_PATH, ITEM_LIST_PATH};
use marketsync_server::sync::{Orchestrator, SyncSettings};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

/// Shop used by every scenario.
pub const SHOP: ShopId = ShopId::new(9001);

/// Access token seeded for [`SHOP`].
pub const ACCESS_TOKEN: &str = "access-token-1";

/// Refresh token seeded for [`SHOP`].
pub const REFRESH_TOKEN: &str = "refresh-token-1";

/// Marketplace client pointed at a mock server.
pub fn client_for(server: &MockServer) -> MarketplaceClient {
    MarketplaceClient::new(&MarketplaceConfig {
        base_url: Url::parse(&server.base_url()).unwrap(),
        partner_id: 2_001_234,
        partner_key: SecretString::from("k3y-For-Tests-0nly"),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

/// Orchestrator over `store` with default settings (page size 50).
pub fn orchestrator(server: &MockServer, store: Arc<MemoryStore>) -> Orchestrator {
    Orchestrator::new(store, client_for(server), SyncSettings::default())
}

/// Seed the credential for [`SHOP`] with an access token expiring in `access_in`.
pub fn seed_credential(store: &MemoryStore, access_in: chrono::Duration) {
    let now = Utc::now();
    store
        .put_credential(ShopCredential {
            shop_id: SHOP,
            access_token: SecretString::from(ACCESS_TOKEN),
            refresh_token: Some(SecretString::from(REFRESH_TOKEN)),
            access_token_expires_at: now + access_in,
            refresh_token_expires_at: Some(now + chrono::Duration::days(30)),
            updated_at: now,
        })
        .unwrap();
}

/// A detail record as `get_item_base_info` returns it.
pub fn item_record(item_id: i64) -> Value {
    json!({
        "item_id": item_id,
        "category_id": 100_017,
        "item_name": format!("Item {item_id}"),
        "item_sku": format!("SKU-{item_id}"),
        "item_status": "NORMAL",
        "price_info": [{"currency": "MYR", "original_price": 19.9, "current_price": 15.5}],
        "stock_info_v2": {"summary_info": {"total_available_stock": 10, "total_reserved_stock": 1}},
        "weight": "0.25",
        "has_model": false,
        "update_time": 1_760_000_000
    })
}

fn id_csv(ids: &RangeInclusive<i64>) -> String {
    ids.clone()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Mock one `get_item_list` page listing `ids`, served at `offset`.
pub async fn mock_list_page<'a>(
    server: &'a MockServer,
    access_token: &str,
    offset: i64,
    ids: RangeInclusive<i64>,
    has_next_page: bool,
) -> Mock<'a> {
    let entries: Vec<Value> = ids
        .clone()
        .map(|id| json!({"item_id": id, "item_status": "NORMAL"}))
        .collect();
    let next_offset = offset + i64::try_from(entries.len()).unwrap();
    let access_token = access_token.to_string();

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(ITEM_LIST_PATH)
                .query_param("access_token", access_token)
                .query_param("offset", offset.to_string());
            then.status(200).json_body(json!({
                "error": "",
                "message": "",
                "response": {
                    "item": entries,
                    "total_count": 0,
                    "has_next_page": has_next_page,
                    "next_offset": next_offset
                }
            }));
        })
        .await
}

/// Mock a `get_item_base_info` batch answering with a record per id.
pub async fn mock_detail_batch(server: &MockServer, ids: RangeInclusive<i64>) -> Mock<'_> {
    let records: Vec<Value> = ids.clone().map(item_record).collect();
    let csv = id_csv(&ids);

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(ITEM_DETAIL_PATH)
                .query_param("item_id_list", csv);
            then.status(200).json_body(json!({
                "error": "",
                "message": "",
                "response": {"item_list": records}
            }));
        })
        .await
}

/// Mock a `get_item_base_info` batch that fails with an HTTP 500.
pub async fn mock_failing_detail_batch(
    server: &MockServer,
    ids: RangeInclusive<i64>,
) -> Mock<'_> {
    let csv = id_csv(&ids);

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(ITEM_DETAIL_PATH)
                .query_param("item_id_list", csv);
            then.status(500).body("upstream unavailable");
        })
        .await
}

/// Mock the refresh exchange answering with `body`.
pub async fn mock_refresh(server: &MockServer, body: Value) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path(REFRESH_PATH);
            then.status(200).json_body(body);
        })
        .await
}
