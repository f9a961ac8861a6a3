//! Marketplace Open Platform API client.
//!
//! Read access to a shop's catalog plus the token refresh exchange.
//!
//! # Architecture
//!
//! - Every request is signed with the partner key ([`sign::Signer`])
//! - Shop calls carry the shop's access token and id; the refresh exchange
//!   is a public call signed with partner credentials only
//! - The client holds no credential state; callers pass the credential for
//!   each call

pub mod auth;
pub mod client;
pub mod sign;
pub mod types;

pub use auth::TokenGrant;
pub use client::MarketplaceClient;
pub use sign::Signer;
pub use types::{ItemListPage, RemoteItem};

use thiserror::Error;

/// Errors that can occur when interacting with the marketplace API.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The API rejected the call with an error payload.
    #[error("API error {code}: {message}")]
    Api {
        /// Marketplace error code (e.g. `error_auth`).
        code: String,
        /// Human readable message.
        message: String,
    },

    /// A successful response was missing a required part.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request could not be signed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Base URL could not be joined with an API path.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Maximum number of body bytes kept in error messages.
const MAX_ERROR_BODY: usize = 512;

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = MarketplaceError::Api {
            code: "error_auth".to_string(),
            message: "Invalid access_token.".to_string(),
        };
        assert_eq!(err.to_string(), "API error error_auth: Invalid access_token.");
    }

    #[test]
    fn test_status_error_display() {
        let err = MarketplaceError::Status {
            status: 503,
            body: "upstream unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: upstream unavailable");
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short".to_string()), "short");
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        let truncated = truncate_body(long);
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
        assert!(truncated.ends_with("..."));
    }
}
