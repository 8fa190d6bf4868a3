//! User projection: turning a user key into the summary stored on a session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::storage::models::UserSummary;

/// A user reference as supplied by the authorization callback
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserKey {
    Id(i64),
    Name(String),
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::Id(id) => write!(f, "{id}"),
            UserKey::Name(name) => f.write_str(name),
        }
    }
}

impl UserKey {
    /// Read a key from untyped text such as a query string: integers become
    /// `Id`, anything else a `Name`.
    pub fn from_text(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(id) => UserKey::Id(id),
            Err(_) => UserKey::Name(raw.to_string()),
        }
    }
}

impl From<i64> for UserKey {
    fn from(id: i64) -> Self {
        UserKey::Id(id)
    }
}

impl From<&str> for UserKey {
    fn from(name: &str) -> Self {
        UserKey::Name(name.to_string())
    }
}

pub trait UserProjector: Send + Sync {
    /// Resolve a user key to its summary, or `None` if the user is unknown
    fn project(&self, key: &UserKey) -> Option<UserSummary>;
}

/// Projects every key to `{"id": key}`. Used when no user directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdProjector;

impl UserProjector for IdProjector {
    fn project(&self, key: &UserKey) -> Option<UserSummary> {
        let mut summary = UserSummary::new();
        summary.insert("id".to_string(), id_value(key));
        Some(summary)
    }
}

#[derive(Debug, Error)]
pub enum UserDirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid user directory: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A fixed set of user summaries, keyed by the string form of the user key.
///
/// The on-disk format is a JSON object mapping user keys to summary objects:
/// `{"1": {"name": "Ann", "level": 5}, "bob": {"name": "Bob"}}`.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, UserSummary>,
}

impl UserDirectory {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, UserDirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, UserDirectoryError> {
        let users: HashMap<String, UserSummary> = serde_json::from_str(raw)?;
        Ok(Self { users })
    }

    pub fn insert(&mut self, key: UserKey, summary: UserSummary) {
        self.users.insert(key.to_string(), summary);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserProjector for UserDirectory {
    fn project(&self, key: &UserKey) -> Option<UserSummary> {
        let mut summary = self.users.get(&key.to_string())?.clone();
        summary
            .entry("id".to_string())
            .or_insert_with(|| id_value(key));
        Some(summary)
    }
}

fn id_value(key: &UserKey) -> serde_json::Value {
    match key {
        UserKey::Id(id) => serde_json::Value::from(*id),
        UserKey::Name(name) => serde_json::Value::from(name.as_str()),
    }
}
