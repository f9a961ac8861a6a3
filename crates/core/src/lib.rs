//! Marketsync Core - Shared domain types.
//!
//! This crate provides the types shared by the catalog engine and its tools:
//! - `server` - Sync engine, storage and HTTP invocation boundary
//! - `cli` - Command-line tools for migrations and one-off runs
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Token validity classification lives here so it can
//! be evaluated against any clock.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, statuses and credential state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
