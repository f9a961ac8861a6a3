//! End-to-end catalog sync scenarios against a mock marketplace.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use httpmock::Method::GET;
use httpmock::MockServer;
use marketsync_core::{ItemId, PriceRuleId, SyncStatus};
use marketsync_integration_tests::{
    ACCESS_TOKEN, SHOP, mock_detail_batch, mock_failing_detail_batch, mock_list_page,
    orchestrator, seed_credential,
};
use marketsync_server::db::MemoryStore;
use marketsync_server::db::memory::LocalFields;
use marketsync_server::marketplace::client::ITEM_LIST_PATH;
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn test_full_crawl_pages_through_catalog() {
    let server = MockServer::start_async().await;
    let page_1 = mock_list_page(&server, ACCESS_TOKEN, 0, 1..=50, true).await;
    let page_2 = mock_list_page(&server, ACCESS_TOKEN, 50, 51..=100, true).await;
    let page_3 = mock_list_page(&server, ACCESS_TOKEN, 100, 101..=120, false).await;
    mock_detail_batch(&server, 1..=50).await;
    mock_detail_batch(&server, 51..=100).await;
    mock_detail_batch(&server, 101..=120).await;

    let store = Arc::new(MemoryStore::new());
    seed_credential(&store, Duration::hours(4));

    let outcome = orchestrator(&server, store.clone())
        .run_sync(SHOP, ACCESS_TOKEN)
        .await
        .unwrap();

    assert_eq!(page_1.hits_async().await, 1);
    assert_eq!(page_2.hits_async().await, 1);
    assert_eq!(page_3.hits_async().await, 1);

    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(outcome.summary.total_fetched, 120);
    assert_eq!(outcome.summary.synced, 120);
    assert_eq!(outcome.summary.failed, 0);
    assert!(outcome.error_message.is_none());

    let items = store.items(SHOP).unwrap();
    assert_eq!(items.len(), 120);
    assert_eq!(items[0].item_name, "Item 1");
    assert_eq!(items[0].current_price, Some(Decimal::from_str("15.50").unwrap()));
    assert_eq!(items[0].weight, Some(Decimal::from_str("0.250").unwrap()));

    let runs = store.runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, outcome.run_id);
    assert_eq!(runs[0].items_synced, 120);
    assert!(runs[0].completed_at >= runs[0].started_at);
}

#[tokio::test]
async fn test_failed_detail_batch_gives_partial_run() {
    let server = MockServer::start_async().await;
    mock_list_page(&server, ACCESS_TOKEN, 0, 1..=50, true).await;
    mock_list_page(&server, ACCESS_TOKEN, 50, 51..=100, true).await;
    mock_list_page(&server, ACCESS_TOKEN, 100, 101..=120, false).await;
    mock_detail_batch(&server, 1..=50).await;
    mock_failing_detail_batch(&server, 51..=100).await;
    mock_detail_batch(&server, 101..=120).await;

    let store = Arc::new(MemoryStore::new());
    seed_credential(&store, Duration::hours(4));

    let outcome = orchestrator(&server, store.clone())
        .run_sync(SHOP, ACCESS_TOKEN)
        .await
        .unwrap();

    assert_eq!(outcome.status, SyncStatus::Partial);
    assert_eq!(outcome.summary.total_fetched, 70);
    assert_eq!(outcome.summary.synced, 70);
    assert_eq!(outcome.summary.failed, 50);
    assert!(
        outcome
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("1 item detail batches failed")
    );

    let items = store.items(SHOP).unwrap();
    assert_eq!(items.len(), 70);
    assert!(items.iter().all(|item| {
        let id = item.item_id.as_i64();
        !(51..=100).contains(&id)
    }));
}

#[tokio::test]
async fn test_list_error_ends_crawl_early() {
    let server = MockServer::start_async().await;
    mock_list_page(&server, ACCESS_TOKEN, 0, 1..=50, true).await;
    mock_detail_batch(&server, 1..=50).await;
    let page_2 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(ITEM_LIST_PATH)
                .query_param("offset", "50");
            then.status(200).json_body(json!({
                "error": "error_server",
                "message": "system busy"
            }));
        })
        .await;
    let page_3 = mock_list_page(&server, ACCESS_TOKEN, 100, 101..=120, false).await;

    let store = Arc::new(MemoryStore::new());
    seed_credential(&store, Duration::hours(4));

    let outcome = orchestrator(&server, store.clone())
        .run_sync(SHOP, ACCESS_TOKEN)
        .await
        .unwrap();

    assert_eq!(page_2.hits_async().await, 1);
    assert_eq!(page_3.hits_async().await, 0);
    assert_eq!(outcome.status, SyncStatus::Partial);
    assert_eq!(outcome.summary.synced, 50);
    assert!(outcome.error_message.unwrap().contains("error_server"));
    assert_eq!(store.items(SHOP).unwrap().len(), 50);
}

#[tokio::test]
async fn test_repeated_sync_is_idempotent_and_keeps_local_fields() {
    let server = MockServer::start_async().await;
    let list = mock_list_page(&server, ACCESS_TOKEN, 0, 1..=20, false).await;
    mock_detail_batch(&server, 1..=20).await;

    let store = Arc::new(MemoryStore::new());
    seed_credential(&store, Duration::hours(4));
    let engine = orchestrator(&server, store.clone());

    let first = engine.run_sync(SHOP, ACCESS_TOKEN).await.unwrap();
    assert_eq!(first.summary.synced, 20);

    let local = LocalFields {
        cost_price: Some(Decimal::from_str("7.25").unwrap()),
        notes: Some("bundle with item 2".to_string()),
        price_rule_id: Some(PriceRuleId::new(3)),
        auto_adjust_enabled: true,
        min_price: Some(Decimal::from_str("12.00").unwrap()),
        ..LocalFields::default()
    };
    store
        .set_local_fields(SHOP, ItemId::new(1), local.clone())
        .unwrap();
    let before = store.items(SHOP).unwrap();

    let second = engine.run_sync(SHOP, ACCESS_TOKEN).await.unwrap();
    assert_eq!(list.hits_async().await, 2);
    assert_eq!(second.status, SyncStatus::Success);
    assert_eq!(second.summary.synced, 20);

    let after = store.items(SHOP).unwrap();
    assert_eq!(after.len(), 20);
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.remote_fields(), new.remote_fields());
        assert!(new.last_synced_at > old.last_synced_at);
    }

    let item_1 = &after[0];
    assert_eq!(item_1.cost_price, local.cost_price);
    assert_eq!(item_1.notes, local.notes);
    assert_eq!(item_1.price_rule_id, Some(PriceRuleId::new(3)));
    assert!(item_1.auto_adjust_enabled);
    assert_eq!(item_1.min_price, local.min_price);

    // Unchanged prices append no history.
    assert!(store.price_history().unwrap().is_empty());

    let runs = store.runs().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs[1].id > runs[0].id);
}
