//! Unified error handling for the HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::marketplace::MarketplaceError;
use crate::sync::SyncError;

/// Application-level error type for the sync server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Marketplace API operation failed.
    #[error("Marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credential missing, invalid, or no longer refreshable.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Storage(e) => Self::Database(e),
            SyncError::Auth(_) | SyncError::Refresh { .. } => Self::Unauthorized(err.to_string()),
            SyncError::RemoteList(e) | SyncError::RemoteDetail { source: e, .. } => {
                Self::Marketplace(e)
            }
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Marketplace(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Marketplace(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Sync request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::Marketplace(_) => "Marketplace service error".to_string(),
            _ => self.to_string(),
        };

        (
            status,
            Json(json!({
                "status": "error",
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use marketsync_core::ShopId;

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("shop 9001".to_string());
        assert_eq!(err.to_string(), "Not found: shop 9001");

        let err = AppError::BadRequest("shop_id is required".to_string());
        assert_eq!(err.to_string(), "Bad request: shop_id is required");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sync_error_mapping() {
        let refresh = AppError::from(SyncError::Refresh {
            shop_id: ShopId::new(1),
            reason: "rejected".to_string(),
        });
        assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);

        let auth = AppError::from(SyncError::Auth("no credential".to_string()));
        assert_eq!(auth.status(), StatusCode::UNAUTHORIZED);

        let storage = AppError::from(SyncError::Storage(RepositoryError::NotFound));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
