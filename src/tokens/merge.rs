use crate::storage::RecordStore;

use super::SessionError;

/// Re-anchor the record at `other_key` onto the lineage of `primary_main_key`.
///
/// Only the record's `main_key` changes. Future rotations descending from it
/// extend the primary Main record instead of their original one.
pub fn merge_main_tokens(
    store: &mut dyn RecordStore,
    primary_main_key: &str,
    other_key: &str,
) -> Result<(), SessionError> {
    let mut record = store.get(other_key)?.ok_or(SessionError::KeyNotFound)?;

    let record_kind = record.kind();
    record.set_main_key(primary_main_key.to_string());
    store.put(record)?;

    tracing::debug!(kind = %record_kind, "Merged record into lineage");
    Ok(())
}
