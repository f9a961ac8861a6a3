//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKETSYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MARKETPLACE_PARTNER_ID` - Open Platform partner id
//! - `MARKETPLACE_PARTNER_KEY` - Open Platform partner key (high entropy)
//!
//! ## Optional
//! - `MARKETSYNC_HOST` - Bind address (default: 127.0.0.1)
//! - `MARKETSYNC_PORT` - Listen port (default: 3002)
//! - `MARKETPLACE_BASE_URL` - API host (default: <https://partner.shopeemobile.com>)
//! - `MARKETPLACE_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (default: 1.0)
//!
//! ## Optional (sync tuning)
//! - `SYNC_PAGE_SIZE` - Ids per list call, clamped to 1..=100 (default: 50)
//! - `SYNC_DETAIL_BATCH_SIZE` - Ids per detail call, clamped to 1..=50 (default: 50)
//! - `SYNC_MERGE_CONCURRENCY` - Concurrent merges (default: 8)
//! - `SYNC_MAX_PAGES` - List call cap per run (default: 10000)
//! - `SYNC_ITEM_STATUSES` - Comma-separated listing statuses (default: NORMAL,UNLIST)
//! - `REFRESH_TOKEN_TTL_DAYS` - Assumed refresh token lifetime, 1..=365 (default: 30)
//! - `TOKEN_REFRESH_SKEW_SECS` - Proactive refresh window, 0..=86400 (default: 60)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use marketsync_core::{DEFAULT_REFRESH_TOKEN_TTL_DAYS, ItemStatus};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::sync::{FetchSettings, SyncSettings, TokenPolicy};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_BASE_URL: &str = "https://partner.shopeemobile.com";
const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;
const MAX_REFRESH_SKEW_SECS: i64 = 86_400;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Marketplace API access
    pub marketplace: MarketplaceConfig,
    /// Engine tuning
    pub sync: SyncSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Marketplace Open Platform configuration.
///
/// Implements `Debug` manually to redact the partner key.
#[derive(Clone)]
pub struct MarketplaceConfig {
    /// API host, e.g. `https://partner.shopeemobile.com`
    pub base_url: Url,
    /// Partner application id
    pub partner_id: i64,
    /// Partner application key (signs every request)
    pub partner_key: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("base_url", &self.base_url.as_str())
            .field("partner_id", &self.partner_id)
            .field("partner_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MARKETSYNC_DATABASE_URL")?;
        let host = parse_env("MARKETSYNC_HOST", "127.0.0.1")?;
        let port = parse_env("MARKETSYNC_PORT", "3002")?;
        let marketplace = MarketplaceConfig::from_env()?;
        let sync = sync_settings_from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            marketplace,
            sync,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MarketplaceConfig {
    /// Load marketplace access settings.
    ///
    /// Used directly by the CLI, which does not need the server settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the partner credentials are missing or weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let partner_id: i64 = parse_required("MARKETPLACE_PARTNER_ID")?;
        if partner_id <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MARKETPLACE_PARTNER_ID".to_string(),
                "must be a positive integer".to_string(),
            ));
        }
        let timeout_secs: u64 = parse_env("MARKETPLACE_TIMEOUT_SECS", "30")?;

        Ok(Self {
            base_url: parse_env("MARKETPLACE_BASE_URL", DEFAULT_BASE_URL)?,
            partner_id,
            partner_key: get_validated_secret("MARKETPLACE_PARTNER_KEY")?,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

/// Load engine tuning.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if a value does not parse.
pub fn sync_settings_from_env() -> Result<SyncSettings, ConfigError> {
    let item_statuses = parse_item_statuses(&get_env_or_default(
        "SYNC_ITEM_STATUSES",
        "NORMAL,UNLIST",
    ))
    .map_err(|e| ConfigError::InvalidEnvVar("SYNC_ITEM_STATUSES".to_string(), e))?;

    let fetch = FetchSettings {
        page_size: parse_env("SYNC_PAGE_SIZE", "50")?,
        detail_batch_size: parse_env("SYNC_DETAIL_BATCH_SIZE", "50")?,
        max_pages: parse_env("SYNC_MAX_PAGES", "10000")?,
        item_statuses,
    }
    .clamped();

    let merge_concurrency: usize = parse_env("SYNC_MERGE_CONCURRENCY", "8")?;
    let ttl_days: i64 = parse_env(
        "REFRESH_TOKEN_TTL_DAYS",
        &DEFAULT_REFRESH_TOKEN_TTL_DAYS.to_string(),
    )?;
    let skew_secs: i64 = parse_env("TOKEN_REFRESH_SKEW_SECS", "60")?;

    Ok(SyncSettings {
        fetch,
        merge_concurrency: merge_concurrency.max(1),
        tokens: TokenPolicy {
            refresh_token_ttl: bounded_delta(
                "REFRESH_TOKEN_TTL_DAYS",
                ttl_days,
                1..=MAX_REFRESH_TOKEN_TTL_DAYS,
                chrono::TimeDelta::try_days,
            )?,
            refresh_skew: bounded_delta(
                "TOKEN_REFRESH_SKEW_SECS",
                skew_secs,
                0..=MAX_REFRESH_SKEW_SECS,
                chrono::TimeDelta::try_seconds,
            )?,
        },
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

/// Parse a required environment variable.
fn parse_required<T>(key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_required_env(key)?)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Turn a parsed duration setting into a `TimeDelta`, rejecting values
/// outside `range`.
fn bounded_delta(
    key: &str,
    value: i64,
    range: RangeInclusive<i64>,
    to_delta: fn(i64) -> Option<chrono::TimeDelta>,
) -> Result<chrono::TimeDelta, ConfigError> {
    if !range.contains(&value) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!(
                "{value} is outside {}..={}",
                range.start(),
                range.end()
            ),
        ));
    }
    to_delta(value)
        .ok_or_else(|| ConfigError::InvalidEnvVar(key.to_string(), format!("{value} overflows")))
}

/// Parse a comma-separated list of listing statuses.
fn parse_item_statuses(raw: &str) -> Result<Vec<ItemStatus>, String> {
    let statuses = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ItemStatus::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if statuses.is_empty() {
        return Err("at least one item status is required".to_string());
    }
    Ok(statuses)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the marketplace."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-partner-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("4e6f7a3b9c1d2e8f0a5b6c7d8e9f1a2b", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_item_statuses() {
        assert_eq!(
            parse_item_statuses("NORMAL, unlist").unwrap(),
            vec![ItemStatus::Normal, ItemStatus::Unlist]
        );
        assert!(parse_item_statuses("NORMAL,DELETED").is_err());
        assert!(parse_item_statuses(" , ").is_err());
    }

    #[test]
    fn test_parse_value_reports_variable() {
        let err = parse_value::<u32>("SYNC_PAGE_SIZE", "fifty").unwrap_err();
        assert!(err.to_string().contains("SYNC_PAGE_SIZE"));
        assert_eq!(parse_value::<u32>("SYNC_PAGE_SIZE", " 20 ").unwrap(), 20);
    }

    #[test]
    fn test_bounded_delta_rejects_out_of_range() {
        let ttl = bounded_delta("REFRESH_TOKEN_TTL_DAYS", 30, 1..=365, chrono::TimeDelta::try_days);
        assert_eq!(ttl.unwrap(), chrono::TimeDelta::days(30));

        let err = bounded_delta(
            "REFRESH_TOKEN_TTL_DAYS",
            i64::MAX,
            1..=365,
            chrono::TimeDelta::try_days,
        )
        .unwrap_err();
        assert!(err.to_string().contains("REFRESH_TOKEN_TTL_DAYS"));

        assert!(
            bounded_delta(
                "TOKEN_REFRESH_SKEW_SECS",
                -5,
                0..=86_400,
                chrono::TimeDelta::try_seconds
            )
            .is_err()
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = SyncConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3002,
            marketplace: MarketplaceConfig {
                base_url: Url::parse(DEFAULT_BASE_URL).unwrap(),
                partner_id: 1,
                partner_key: SecretString::from("key"),
                timeout: Duration::from_secs(30),
            },
            sync: SyncSettings::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
    }

    #[test]
    fn test_marketplace_config_debug_redacts_key() {
        let config = MarketplaceConfig {
            base_url: Url::parse(DEFAULT_BASE_URL).unwrap(),
            partner_id: 2_001_234,
            partner_key: SecretString::from("super_secret_partner_key"),
            timeout: Duration::from_secs(30),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("2001234"));
        assert!(debug_output.contains("partner.shopeemobile.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_partner_key"));
    }
}
