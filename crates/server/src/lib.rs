//! Marketsync - marketplace catalog synchronization and credential lifecycle engine.
//!
//! Mirrors a merchant's marketplace catalog into `PostgreSQL`, keeping the
//! shop's access token valid along the way.
//!
//! # Architecture
//!
//! - [`marketplace`] - Signed Open Platform client (item list, item detail, token refresh)
//! - [`sync`] - Crawl, merge, token lifecycle and run recording
//! - [`db`] - Storage behind the [`db::SyncStore`] trait
//! - [`routes`] - Axum HTTP surface
//!
//! The `marketsync-server` binary serves the HTTP API; the `marketsync` CLI
//! drives the same engine from the command line.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod marketplace;
pub mod routes;
pub mod state;
pub mod sync;

pub use config::{ConfigError, MarketplaceConfig, SyncConfig};
pub use error::AppError;
pub use state::AppState;
