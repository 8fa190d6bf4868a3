//! simple-auth - identifier-to-token session lifecycle service
//!
//! A caller obtains an opaque identifier, a user is bound to it out-of-band,
//! and the identifier is exchanged for a short-lived access/update token pair
//! that can be refreshed before it expires. Token pairs descending from one
//! identifier form a lineage anchored by a main key; lineages started on
//! different devices can be merged into one.
//!
//! - Pure command facade returning `{error, msg, result}` envelopes
//! - In-memory or redb-backed record store
//! - Optional background reaper for stale records
//! - JSON-over-HTTP transport (axum)

pub mod api;
pub mod clock;
pub mod commands;
pub mod config;
pub mod engine;
pub mod expiration;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;
pub mod users;

use config::Config;
use engine::SessionEngine;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub engine: SessionEngine,
}
