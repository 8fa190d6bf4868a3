use chrono::{DateTime, Duration, Utc};

use crate::storage::models::{IdentifierRecord, SessionRecord, UserSummary};
use crate::storage::RecordStore;

use super::generator::KeyGenerator;
use super::{mint_key, SessionError};

/// Create a new identifier record and return its key.
///
/// The lineage's main key is reserved here but the Main record itself only
/// appears on the first rotation.
pub fn issue(
    store: &mut dyn RecordStore,
    keys: &dyn KeyGenerator,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<String, SessionError> {
    let key = mint_key(store, keys)?;
    let main_key = mint_key(store, keys)?;

    store.put(SessionRecord::Identifier(IdentifierRecord {
        created_at: now,
        expires_at: now + ttl,
        key: key.clone(),
        main_key,
        user: None,
    }))?;

    tracing::debug!(ttl_seconds = ttl.num_seconds(), "Issued identifier");
    Ok(key)
}

/// Attach a user summary to an identifier, replacing any earlier binding.
///
/// No expiry check here; freshness is enforced when the identifier is exchanged.
pub fn bind_user(
    store: &mut dyn RecordStore,
    identifier: &str,
    user: UserSummary,
) -> Result<(), SessionError> {
    match store.get(identifier)? {
        Some(SessionRecord::Identifier(mut record)) => {
            record.user = Some(user);
            store.put(SessionRecord::Identifier(record))?;
            tracing::debug!("Bound user to identifier");
            Ok(())
        }
        _ => Err(SessionError::KeyNotFound),
    }
}

/// Resolve a key and check that it is not within `margin` of expiring.
pub fn check(
    store: &dyn RecordStore,
    key: &str,
    now: DateTime<Utc>,
    margin: Duration,
) -> Result<SessionRecord, SessionError> {
    let record = store.get(key)?.ok_or(SessionError::KeyNotFound)?;

    if !is_fresh(record.expires_at(), now, margin) {
        tracing::debug!(kind = %record.kind(), "Record expired");
        return Err(SessionError::KeyExpired);
    }

    Ok(record)
}

/// A record is fresh while at least `margin` remains before `expires_at`.
pub fn is_fresh(expires_at: DateTime<Utc>, now: DateTime<Utc>, margin: Duration) -> bool {
    expires_at - now >= margin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testutil::{at, make_identifier, user};
    use crate::tokens::ScriptedKeys;

    #[test]
    fn test_issue_writes_identifier_record() {
        let mut store = MemoryStore::new();
        let keys = ScriptedKeys::new(["mock_uuid4", "mock_uuid4_1"]);

        let identifier = issue(&mut store, &keys, at(100), Duration::seconds(45)).unwrap();
        assert_eq!(identifier, "mock_uuid4");

        let record = store.get("mock_uuid4").unwrap().unwrap();
        assert_eq!(
            record,
            SessionRecord::Identifier(IdentifierRecord {
                created_at: at(100),
                expires_at: at(145),
                key: "mock_uuid4".to_string(),
                main_key: "mock_uuid4_1".to_string(),
                user: None,
            })
        );
        // Main is only a forward reference at this point
        assert!(!store.contains("mock_uuid4_1").unwrap());
    }

    #[test]
    fn test_issue_skips_colliding_keys() {
        let mut store = MemoryStore::new();
        store.put(make_identifier("taken", "m0", 145, None)).unwrap();
        let keys = ScriptedKeys::new(["taken", "id1", "m1"]);

        let identifier = issue(&mut store, &keys, at(100), Duration::seconds(45)).unwrap();
        assert_eq!(identifier, "id1");
        assert_eq!(store.get("id1").unwrap().unwrap().main_key(), "m1");
    }

    #[test]
    fn test_bind_user() {
        let mut store = MemoryStore::new();
        store.put(make_identifier("id1", "m1", 10, None)).unwrap();

        let err = bind_user(&mut store, "wrong", user(1)).unwrap_err();
        assert!(matches!(err, SessionError::KeyNotFound));

        // Binding ignores expiry
        bind_user(&mut store, "id1", user(1)).unwrap();
        assert_eq!(store.get("id1").unwrap().unwrap().user(), Some(&user(1)));
    }

    #[test]
    fn test_bind_user_last_write_wins() {
        let mut store = MemoryStore::new();
        store.put(make_identifier("id1", "m1", 145, None)).unwrap();

        bind_user(&mut store, "id1", user(1)).unwrap();
        bind_user(&mut store, "id1", user(2)).unwrap();

        assert_eq!(store.get("id1").unwrap().unwrap().user(), Some(&user(2)));
    }

    #[test]
    fn test_check_margin_boundary() {
        let mut store = MemoryStore::new();
        let margin = Duration::seconds(1);
        store.put(make_identifier("edge", "m1", 100, None)).unwrap();
        store.put(make_identifier("ok", "m2", 101, None)).unwrap();

        // expires_at = now + margin - 1
        let err = check(&store, "edge", at(100), margin).unwrap_err();
        assert!(matches!(err, SessionError::KeyExpired));

        // expires_at = now + margin
        assert!(check(&store, "ok", at(100), margin).is_ok());

        let err = check(&store, "missing", at(100), margin).unwrap_err();
        assert!(matches!(err, SessionError::KeyNotFound));
    }

    #[test]
    fn test_is_fresh_with_wider_margin() {
        let margin = Duration::seconds(5);
        assert!(!is_fresh(at(104), at(100), margin));
        assert!(is_fresh(at(105), at(100), margin));
    }
}
