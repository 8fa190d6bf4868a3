use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use super::db::DatabaseError;
use super::models::SessionRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One mutation within a batch passed to `RecordStore::apply`
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Delete(String),
    Put(SessionRecord),
}

/// A flat keyed map of session records.
///
/// Staleness is evaluated by callers at read time; the store itself never
/// expires anything unless `delete_expired` is called explicitly.
pub trait RecordStore: Send {
    /// Insert or overwrite the record at its own key
    fn put(&mut self, record: SessionRecord) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Remove a record, returning whether it existed
    fn delete(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Apply a batch of mutations in order. Either every operation takes
    /// effect or none does.
    fn apply(&mut self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Remove every record whose expiry is before `now`
    fn delete_expired(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// In-process store backed by a `HashMap`
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, SessionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn put(&mut self, record: SessionRecord) -> Result<(), StoreError> {
        debug_assert!(!record.key().is_empty(), "record key must not be empty");
        self.records.insert(record.key().to_string(), record);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(key).is_some())
    }

    fn apply(&mut self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        for op in ops {
            match op {
                WriteOp::Delete(key) => {
                    self.records.remove(&key);
                }
                WriteOp::Put(record) => {
                    self.put(record)?;
                }
            }
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(key))
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }

    fn delete_expired(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired_at(now));
        Ok(before - self.records.len())
    }
}
