//! Sync run audit log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use marketsync_core::{ShopId, SyncStatus, SyncType};
use tracing::info;

use crate::db::{NewSyncRun, RepositoryError, SyncRun, SyncStore};

/// Counters and outcome of one run, ready to be recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTally {
    pub total_fetched: u64,
    pub synced: u64,
    pub failed: u64,
    /// False when the list phase ended early.
    pub crawl_complete: bool,
    pub error_message: Option<String>,
}

impl RunTally {
    #[must_use]
    pub const fn status(&self) -> SyncStatus {
        SyncStatus::from_counts(self.synced, self.failed, self.crawl_complete)
    }
}

/// Appends one record per sync invocation.
#[derive(Clone)]
pub struct SyncRunRecorder {
    store: Arc<dyn SyncStore>,
}

impl SyncRunRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Record a run that reached the crawl.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    pub async fn record(
        &self,
        shop_id: ShopId,
        started_at: DateTime<Utc>,
        tally: &RunTally,
    ) -> Result<SyncRun, RepositoryError> {
        let run = NewSyncRun {
            shop_id,
            sync_type: SyncType::FullCatalog,
            status: tally.status(),
            items_synced: to_count(tally.synced),
            items_failed: to_count(tally.failed),
            total_fetched: to_count(tally.total_fetched),
            error_message: tally.error_message.clone(),
            started_at,
            completed_at: Utc::now(),
        };

        let recorded = self.store.insert_sync_run(&run).await?;
        info!(
            shop_id = %shop_id,
            run_id = %recorded.id,
            status = %recorded.status,
            synced = recorded.items_synced,
            failed = recorded.items_failed,
            "recorded sync run"
        );
        Ok(recorded)
    }

    /// Record a run that never obtained a usable credential.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    pub async fn record_failure(
        &self,
        shop_id: ShopId,
        started_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<SyncRun, RepositoryError> {
        let tally = RunTally {
            error_message: Some(reason.to_string()),
            ..RunTally::default()
        };
        self.record(shop_id, started_at, &tally).await
    }
}

fn to_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn tally(synced: u64, failed: u64, crawl_complete: bool) -> RunTally {
        RunTally {
            total_fetched: synced + failed,
            synced,
            failed,
            crawl_complete,
            error_message: None,
        }
    }

    #[test]
    fn test_status_rules() {
        assert_eq!(tally(10, 0, true).status(), SyncStatus::Success);
        assert_eq!(tally(0, 0, true).status(), SyncStatus::Success);
        assert_eq!(tally(7, 3, true).status(), SyncStatus::Partial);
        assert_eq!(tally(0, 3, true).status(), SyncStatus::Failed);
        assert_eq!(tally(5, 0, false).status(), SyncStatus::Partial);
        assert_eq!(tally(0, 0, false).status(), SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_record_appends_run() {
        let store = Arc::new(MemoryStore::new());
        let recorder = SyncRunRecorder::new(store.clone());
        let started = Utc::now();

        let run = recorder
            .record(ShopId::new(1), started, &tally(70, 50, true))
            .await
            .unwrap();

        assert_eq!(run.status, SyncStatus::Partial);
        assert_eq!(run.items_synced, 70);
        assert_eq!(run.items_failed, 50);
        assert_eq!(run.sync_type, SyncType::FullCatalog);
        assert!(run.completed_at >= run.started_at);
        assert_eq!(store.runs().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_failure_has_zero_counts() {
        let store = Arc::new(MemoryStore::new());
        let recorder = SyncRunRecorder::new(store);

        let run = recorder
            .record_failure(ShopId::new(1), Utc::now(), "re-authorization required")
            .await
            .unwrap();

        assert_eq!(run.status, SyncStatus::Failed);
        assert_eq!(run.items_synced, 0);
        assert_eq!(run.items_failed, 0);
        assert_eq!(run.error_message.as_deref(), Some("re-authorization required"));
    }
}
