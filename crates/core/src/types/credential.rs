//! Shop credential validity rules.
//!
//! A shop's access token is short-lived and is renewed with a longer-lived
//! refresh token. [`TokenState`] classifies a credential against a clock so the
//! same rule is used by the engine, the HTTP status endpoint and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Refresh token lifetime assumed when the marketplace does not report one.
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Validity of a stored shop credential at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// `now < access_token_expires_at`.
    Valid,
    /// Access token expired but a live refresh token is on file.
    Expired,
    /// No refresh token, or the refresh token itself expired.
    /// Re-authorization is required.
    Unrecoverable,
}

impl TokenState {
    /// Classify a credential.
    ///
    /// A missing refresh expiry is treated as unknown and therefore usable;
    /// the marketplace is the final judge when the refresh is attempted.
    #[must_use]
    pub fn classify(
        now: DateTime<Utc>,
        access_token_expires_at: DateTime<Utc>,
        has_refresh_token: bool,
        refresh_token_expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        if now < access_token_expires_at {
            return Self::Valid;
        }
        let refresh_live = has_refresh_token && refresh_token_expires_at.is_none_or(|at| now < at);
        if refresh_live {
            Self::Expired
        } else {
            Self::Unrecoverable
        }
    }

    /// Whether API calls can be made with the current access token.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Expired => write!(f, "expired"),
            Self::Unrecoverable => write!(f, "unrecoverable"),
        }
    }
}
