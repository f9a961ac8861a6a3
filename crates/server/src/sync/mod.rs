//! Catalog synchronization engine.
//!
//! # Flow
//!
//! 1. [`tokens::TokenManager`] loads the shop credential and refreshes it if stale
//! 2. [`fetcher::CatalogFetcher`] pages through item ids and fetches details
//! 3. [`merge::MergeEngine`] normalizes and upserts each item
//! 4. [`recorder::SyncRunRecorder`] appends the run to the audit log
//!
//! [`orchestrator::Orchestrator`] sequences the steps for one invocation.
//! List and detail calls are sequential; merges for collected items run
//! concurrently up to `merge_concurrency`, with counters aggregated by a
//! single consumer.

pub mod fetcher;
pub mod merge;
pub mod orchestrator;
pub mod recorder;
pub mod tokens;

use marketsync_core::ShopId;
use serde::Serialize;
use thiserror::Error;

pub use fetcher::{CatalogFetcher, CrawlState, FetchSettings, Termination};
pub use merge::{MergeEngine, MergeError, MergeTally};
pub use orchestrator::{Orchestrator, SyncOutcome};
pub use recorder::{RunTally, SyncRunRecorder};
pub use tokens::{TokenManager, TokenPolicy};

use crate::db::RepositoryError;
use crate::marketplace::MarketplaceError;

/// Errors raised by the sync engine.
///
/// `Auth`, `Refresh` and `Storage` end a run. The remote variants are
/// recorded against the run and never abort it; per-item failures are
/// [`MergeError`]s.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid credential input.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The list phase failed; the crawl ended early.
    #[error("item list request failed: {0}")]
    RemoteList(#[source] MarketplaceError),

    /// A detail batch failed; its ids were counted as failed.
    #[error("item detail request failed for {batch_size} items: {source}")]
    RemoteDetail {
        batch_size: usize,
        #[source]
        source: MarketplaceError,
    },

    /// No usable token could be obtained; the shop must re-authorize.
    #[error("token refresh failed for shop {shop_id}: {reason}")]
    Refresh { shop_id: ShopId, reason: String },

    /// Storage was unavailable.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Counters returned to the caller of a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total_fetched: u64,
    pub synced: u64,
    pub failed: u64,
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub fetch: FetchSettings,
    /// Merges in flight at once.
    pub merge_concurrency: usize,
    pub tokens: TokenPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            merge_concurrency: 8,
            tokens: TokenPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::Refresh {
            shop_id: ShopId::new(9001),
            reason: "invalid refresh_token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "token refresh failed for shop 9001: invalid refresh_token"
        );

        let err = SyncError::RemoteDetail {
            batch_size: 50,
            source: MarketplaceError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "item detail request failed for 50 items: HTTP 502: bad gateway"
        );
    }

    #[test]
    fn test_summary_serializes_counts() {
        let summary = SyncSummary {
            total_fetched: 120,
            synced: 70,
            failed: 50,
        };
        let json = serde_json::to_value(summary).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({"total_fetched": 120, "synced": 70, "failed": 50}))
        );
    }
}
