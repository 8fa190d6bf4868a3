use chrono::{DateTime, Utc};
use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, ReadableTableMetadata,
    WriteTransaction,
};
use std::path::Path;
use thiserror::Error;

use super::models::SessionRecord;
use super::store::{RecordStore, StoreError, WriteOp};
use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Expiry index key: an order-preserving encoding of the expiry second,
/// followed by the record key
pub(crate) fn expiry_key(expires_at: &DateTime<Utc>, key: &str) -> String {
    format!("{}:{}", expiry_prefix(expires_at), key)
}

/// Every index entry expiring strictly before `at` sorts below this bound
pub(crate) fn expiry_prefix(at: &DateTime<Utc>) -> String {
    format!("{:020}", (at.timestamp() as u64) ^ (1 << 63))
}

/// Durable record store on top of redb
pub struct Database {
    db: RedbDatabase,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("simple-auth.redb");
        let db = RedbDatabase::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS)?;
            let _ = write_txn.open_table(RECORD_EXPIRY)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    /// Store a record under its own key
    pub fn put_record(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        insert_in(&write_txn, record)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_record(&self, key: &str) -> Result<Option<SessionRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(RECORDS)?;

        match table.get(key)? {
            Some(data) => {
                let record: SessionRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn delete_record(&self, key: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = remove_in(&write_txn, key)?.is_some();
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Commit a batch of mutations in a single write transaction
    pub fn apply_ops(&self, ops: &[WriteOp]) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        for op in ops {
            match op {
                WriteOp::Delete(key) => {
                    remove_in(&write_txn, key)?;
                }
                WriteOp::Put(record) => insert_in(&write_txn, record)?,
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn count_records(&self) -> Result<usize, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(RECORDS)?;
        Ok(table.len()? as usize)
    }

    /// Delete records whose expiry is before `now`.
    pub fn delete_expired_records(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        // Phase 1: range-scan the expiration index
        let candidates: Vec<String> = {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(RECORD_EXPIRY)?;
            let bound = expiry_prefix(&now);
            let mut result = Vec::new();
            for entry in table.range(..bound.as_str())? {
                let (_, key) = entry?;
                result.push(key.value().to_string());
            }
            result
        };

        if candidates.is_empty() {
            return Ok(0);
        }

        // Phase 2: remove them in one transaction, skipping any record that
        // was extended in between
        let write_txn = self.begin_write()?;
        let mut deleted = 0;
        for key in &candidates {
            let current: Option<SessionRecord> = {
                let table = write_txn.open_table(RECORDS)?;
                let result = table.get(key.as_str())?;
                match result {
                    Some(data) => Some(rmp_serde::from_slice(data.value())?),
                    None => None,
                }
            };
            if current.is_some_and(|record| record.is_expired_at(now)) {
                remove_in(&write_txn, key)?;
                deleted += 1;
            }
        }
        write_txn.commit()?;
        Ok(deleted)
    }
}

/// Write a record and keep its expiry index entry in step
fn insert_in(write_txn: &WriteTransaction, record: &SessionRecord) -> Result<(), DatabaseError> {
    debug_assert!(!record.key().is_empty(), "record key must not be empty");

    let data = rmp_serde::to_vec_named(record)?;
    let previous: Option<SessionRecord> = {
        let mut table = write_txn.open_table(RECORDS)?;
        let result = table.insert(record.key(), data.as_slice())?;
        match result {
            Some(old) => Some(rmp_serde::from_slice(old.value())?),
            None => None,
        }
    };

    let mut expiry_table = write_txn.open_table(RECORD_EXPIRY)?;
    if let Some(previous) = previous {
        let ek = expiry_key(&previous.expires_at(), previous.key());
        expiry_table.remove(ek.as_str())?;
    }
    let ek = expiry_key(&record.expires_at(), record.key());
    expiry_table.insert(ek.as_str(), record.key())?;
    Ok(())
}

/// Remove a record and its expiry index entry, returning the removed record
fn remove_in(
    write_txn: &WriteTransaction,
    key: &str,
) -> Result<Option<SessionRecord>, DatabaseError> {
    let removed: Option<SessionRecord> = {
        let mut table = write_txn.open_table(RECORDS)?;
        let result = table.remove(key)?;
        match result {
            Some(old) => Some(rmp_serde::from_slice(old.value())?),
            None => None,
        }
    };

    if let Some(record) = &removed {
        let mut expiry_table = write_txn.open_table(RECORD_EXPIRY)?;
        let ek = expiry_key(&record.expires_at(), key);
        expiry_table.remove(ek.as_str())?;
    }
    Ok(removed)
}

impl RecordStore for Database {
    fn put(&mut self, record: SessionRecord) -> Result<(), StoreError> {
        Ok(self.put_record(&record)?)
    }

    fn get(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.get_record(key)?)
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.delete_record(key)?)
    }

    fn apply(&mut self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        Ok(self.apply_ops(&ops)?)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.count_records()?)
    }

    fn delete_expired(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.delete_expired_records(now)?)
    }
}
