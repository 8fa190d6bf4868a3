//! The session lifecycle: identifier issuance, user binding, token rotation,
//! access-token validation and lineage merging.
//!
//! Every operation is a free function over a `RecordStore`. Callers are
//! responsible for serializing access to the store (see `SessionEngine`).

pub mod generator;
pub mod identifier;
pub mod merge;
pub mod rotation;
pub mod validator;

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::models::{TokenPair, UserSummary};
use crate::storage::{RecordStore, StoreError};

pub use generator::{generate_hex, generate_uuid, KeyGenerator, RandomKeys, ScriptedKeys};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Access token not found")]
    AccessTokenNotFound,
    #[error("This identifier has expired")]
    KeyExpired,
    #[error("The identifier is wrong")]
    KeyNotFound,
    #[error("Have no information about user")]
    NoUserBound,
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Unknown user: {0}")]
    UnknownUser(String),
}

/// What a caller receives from a successful rotation: the new access token's
/// record, stripped of lineage plumbing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub token_pair: TokenPair,
    pub user: UserSummary,
}

/// Mint a key not already present in the store
pub(crate) fn mint_key(
    store: &dyn RecordStore,
    keys: &dyn KeyGenerator,
) -> Result<String, StoreError> {
    loop {
        let key = keys.generate();
        if !store.contains(&key)? {
            return Ok(key);
        }
        tracing::warn!("Generated key collided with an existing record, retrying");
    }
}
