//! One catalog sync run, end to end.

use std::sync::Arc;

use chrono::Utc;
use marketsync_core::{ShopId, SyncRunId, SyncStatus};
use secrecy::ExposeSecret;
use tracing::{debug, info, instrument};

use super::fetcher::{CatalogFetcher, CrawlState};
use super::merge::MergeEngine;
use super::recorder::{RunTally, SyncRunRecorder};
use super::tokens::TokenManager;
use super::{SyncError, SyncSettings, SyncSummary};
use crate::db::SyncStore;
use crate::marketplace::MarketplaceClient;

/// Result of a run that was recorded.
#[derive(Debug)]
pub struct SyncOutcome {
    pub run_id: SyncRunId,
    pub status: SyncStatus,
    pub summary: SyncSummary,
    pub error_message: Option<String>,
    /// Whether a list call ended the crawl early.
    pub list_aborted: bool,
    /// Final crawl state, `Done` once the run is recorded.
    pub crawl_state: CrawlState,
}

/// Sequences token validation, crawl, merge and recording.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    client: MarketplaceClient,
    settings: SyncSettings,
    tokens: TokenManager,
    merge: MergeEngine,
    recorder: SyncRunRecorder,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, client: MarketplaceClient, settings: SyncSettings) -> Self {
        let tokens = TokenManager::new(Arc::clone(&store), client.clone(), settings.tokens);
        Self {
            inner: Arc::new(OrchestratorInner {
                merge: MergeEngine::new(Arc::clone(&store)),
                recorder: SyncRunRecorder::new(store),
                client,
                settings,
                tokens,
            }),
        }
    }

    /// The token manager shared with this orchestrator.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// Run a full catalog sync for one shop.
    ///
    /// `access_token` is the caller's token context; it must be present but
    /// the stored credential is what the crawl uses.
    ///
    /// # Errors
    ///
    /// - `SyncError::Auth` for a blank token or unknown shop (a failed run is
    ///   recorded for an unknown shop)
    /// - `SyncError::Refresh` if no usable token could be obtained (a failed
    ///   run is recorded)
    /// - `SyncError::Storage` if storage is unavailable
    #[instrument(skip(self, access_token), fields(shop_id = %shop_id))]
    pub async fn run_sync(
        &self,
        shop_id: ShopId,
        access_token: &str,
    ) -> Result<SyncOutcome, SyncError> {
        if shop_id.as_i64() <= 0 {
            return Err(SyncError::Auth(format!("invalid shop_id {shop_id}")));
        }
        if access_token.trim().is_empty() {
            return Err(SyncError::Auth("access_token is required".to_string()));
        }

        let started_at = Utc::now();
        let inner = &self.inner;

        let credential = match inner.tokens.ensure_valid(shop_id).await {
            Ok(credential) => credential,
            Err(SyncError::Storage(err)) => return Err(SyncError::Storage(err)),
            Err(err) => {
                inner
                    .recorder
                    .record_failure(shop_id, started_at, &err.to_string())
                    .await?;
                return Err(err);
            }
        };

        if credential.access_token.expose_secret() != access_token.trim() {
            debug!("request token differs from stored credential, using stored credential");
        }

        let crawl = CatalogFetcher::new(&inner.client, &inner.settings.fetch)
            .crawl(shop_id, &credential.access_token)
            .await;

        let total_fetched = crawl.items.len() as u64;
        let list_aborted = matches!(crawl.state, CrawlState::Aborted);
        let state = crawl.state.into_merging();
        debug!(?state, list_aborted, total_fetched, pages = crawl.pages, "crawl finished");

        let tally = inner
            .merge
            .merge_all(shop_id, crawl.items, inner.settings.merge_concurrency)
            .await;

        let error_message = crawl.termination.reason().or_else(|| {
            crawl.detail_errors.last().map(|last| {
                format!(
                    "{} item detail batches failed, last error: {last}",
                    crawl.detail_errors.len()
                )
            })
        });

        let run_tally = RunTally {
            total_fetched,
            synced: tally.synced(),
            failed: tally.failed + crawl.failed_ids,
            crawl_complete: crawl.termination.is_complete(),
            error_message,
        };
        let run = inner.recorder.record(shop_id, started_at, &run_tally).await?;
        let state = state.finish();

        let summary = SyncSummary {
            total_fetched,
            synced: run_tally.synced,
            failed: run_tally.failed,
        };
        info!(
            run_id = %run.id,
            status = %run.status,
            inserted = tally.inserted,
            updated = tally.updated,
            failed = summary.failed,
            "catalog sync finished"
        );

        Ok(SyncOutcome {
            run_id: run.id,
            status: run.status,
            summary,
            error_message: run.error_message,
            list_aborted,
            crawl_state: state,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::config::MarketplaceConfig;
    use crate::db::{MemoryStore, ShopCredential};
    use crate::marketplace::client::{ITEM_DETAIL_PATH, ITEM_LIST_PATH};

    const SHOP: ShopId = ShopId::new(9001);

    fn seed_credential(store: &MemoryStore) {
        let now = Utc::now();
        store
            .put_credential(ShopCredential {
                shop_id: SHOP,
                access_token: SecretString::from("tok"),
                refresh_token: Some(SecretString::from("refresh")),
                access_token_expires_at: now + ChronoDuration::hours(4),
                refresh_token_expires_at: Some(now + ChronoDuration::days(30)),
                updated_at: now,
            })
            .unwrap();
    }

    fn orchestrator(server: &MockServer, store: Arc<MemoryStore>) -> Orchestrator {
        let client = MarketplaceClient::new(&MarketplaceConfig {
            base_url: Url::parse(&server.base_url()).unwrap(),
            partner_id: 2_001_234,
            partner_key: SecretString::from("k3y-For-Tests-0nly"),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        Orchestrator::new(store, client, SyncSettings::default())
    }

    #[tokio::test]
    async fn test_blank_token_is_rejected_before_any_work() {
        let server = MockServer::start_async().await;
        let store = Arc::new(MemoryStore::new());

        let err = orchestrator(&server, store.clone())
            .run_sync(ShopId::new(9001), "  ")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Auth(_)));
        assert!(store.runs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_shop_records_failed_run() {
        let server = MockServer::start_async().await;
        let store = Arc::new(MemoryStore::new());

        let err = orchestrator(&server, store.clone())
            .run_sync(ShopId::new(9001), "tok")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Auth(_)));
        let runs = store.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, SyncStatus::Failed);
        assert_eq!(runs[0].total_fetched, 0);
    }

    #[tokio::test]
    async fn test_storage_outage_records_nothing() {
        let server = MockServer::start_async().await;
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true).unwrap();

        let err = orchestrator(&server, store.clone())
            .run_sync(ShopId::new(9001), "tok")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Storage(_)));
        store.set_unavailable(false).unwrap();
        assert!(store.runs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completed_crawl_ends_done() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(ITEM_LIST_PATH);
                then.status(200).json_body(json!({
                    "error": "",
                    "response": {"item": [{"item_id": 1}], "has_next_page": false}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(ITEM_DETAIL_PATH);
                then.status(200).json_body(json!({
                    "error": "",
                    "response": {"item_list": [{"item_id": 1, "item_name": "Mug"}]}
                }));
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        seed_credential(&store);

        let outcome = orchestrator(&server, store)
            .run_sync(SHOP, "tok")
            .await
            .unwrap();

        assert_eq!(outcome.status, SyncStatus::Success);
        assert!(!outcome.list_aborted);
        assert!(matches!(outcome.crawl_state, CrawlState::Done));
    }

    #[tokio::test]
    async fn test_aborted_crawl_is_merged_and_ends_done() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(ITEM_LIST_PATH);
                then.status(502).body("bad gateway");
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        seed_credential(&store);

        let outcome = orchestrator(&server, store.clone())
            .run_sync(SHOP, "tok")
            .await
            .unwrap();

        assert!(outcome.list_aborted);
        assert!(matches!(outcome.crawl_state, CrawlState::Done));
        assert_eq!(outcome.status, SyncStatus::Failed);
        assert_eq!(outcome.summary.synced, 0);
        assert_eq!(store.runs().unwrap().len(), 1);
    }
}
