//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                - Liveness check
//! GET  /health/ready                          - Readiness check (storage ping)
//!
//! # Sync
//! POST /api/sync/catalog?shop_id=&access_token= - Run a full catalog sync
//! GET  /api/sync/runs?shop_id=&limit=           - Recent sync runs, newest first
//!
//! # Shop credentials
//! GET  /api/shops/{shop_id}/credential          - Token state and expiries
//! POST /api/shops/{shop_id}/credential/refresh  - Force a token refresh
//! ```

pub mod health;
pub mod shops;
pub mod sync;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;

/// JSON envelope shared by every API response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "error",
            message: message.into(),
            data,
        }
    }
}

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/api/sync/catalog", post(sync::sync_catalog))
        .route("/api/sync/runs", get(sync::list_runs))
        .route("/api/shops/{shop_id}/credential", get(shops::credential_status))
        .route(
            "/api/shops/{shop_id}/credential/refresh",
            post(shops::refresh_credential),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use httpmock::MockServer;
    use secrecy::SecretString;
    use tower::ServiceExt;
    use url::Url;

    use super::routes;
    use crate::config::MarketplaceConfig;
    use crate::db::MemoryStore;
    use crate::marketplace::MarketplaceClient;
    use crate::state::AppState;
    use crate::sync::SyncSettings;

    pub fn app_state(server: &MockServer, store: Arc<MemoryStore>) -> AppState {
        let client = MarketplaceClient::new(&MarketplaceConfig {
            base_url: Url::parse(&server.base_url()).unwrap(),
            partner_id: 2_001_234,
            partner_key: SecretString::from("k3y-For-Tests-0nly"),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        AppState::new(store, client, SyncSettings::default())
    }

    /// Send one request through the router and decode the JSON body.
    pub async fn send(
        state: AppState,
        method: &str,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = routes()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
