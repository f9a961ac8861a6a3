//! Core types for marketsync.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credential;
pub mod id;
pub mod status;

pub use credential::{DEFAULT_REFRESH_TOKEN_TTL_DAYS, TokenState};
pub use id::*;
pub use status::*;
