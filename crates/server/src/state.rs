//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::SyncStore;
use crate::marketplace::MarketplaceClient;
use crate::sync::{Orchestrator, SyncSettings, TokenManager};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn SyncStore>,
    orchestrator: Orchestrator,
}

impl AppState {
    /// Wire the engine to a storage backend and marketplace client.
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, client: MarketplaceClient, settings: SyncSettings) -> Self {
        let orchestrator = Orchestrator::new(Arc::clone(&store), client, settings);
        Self {
            inner: Arc::new(AppStateInner {
                store,
                orchestrator,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn SyncStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.inner.orchestrator
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        self.inner.orchestrator.tokens()
    }
}
