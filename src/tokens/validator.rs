use crate::storage::RecordStore;

use super::SessionError;

/// Confirm that `access_key` resolves to a record with a bound user.
///
/// Expiry is not consulted; that is the rotation path's job.
pub fn check_token(store: &dyn RecordStore, access_key: &str) -> Result<(), SessionError> {
    match store.get(access_key)? {
        Some(record) if record.user().is_some() => Ok(()),
        _ => Err(SessionError::AccessTokenNotFound),
    }
}
