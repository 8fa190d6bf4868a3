//! The session engine: one record store plus the collaborators every
//! lifecycle operation needs, behind a single lock.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::TokenConfig;
use crate::storage::models::SessionRecord;
use crate::storage::RecordStore;
use crate::tokens::{
    identifier, merge, rotation, validator, KeyGenerator, RandomKeys, SessionError, TokenBundle,
};
use crate::users::{IdProjector, UserKey, UserProjector};

/// Owns the record store and serializes every command against it.
///
/// The lock is held for the whole of each command, so a multi-step rotation
/// is atomic: of two concurrent rotations of one key, exactly one succeeds
/// and the other observes `KeyNotFound`.
pub struct SessionEngine {
    clock: Arc<dyn Clock>,
    keys: Arc<dyn KeyGenerator>,
    store: Mutex<Box<dyn RecordStore>>,
    tokens: TokenConfig,
    users: Arc<dyn UserProjector>,
}

impl SessionEngine {
    pub fn new(store: Box<dyn RecordStore>, tokens: TokenConfig) -> Self {
        let keys = RandomKeys::new(tokens.key_format);
        Self {
            clock: Arc::new(SystemClock),
            keys: Arc::new(keys),
            store: Mutex::new(store),
            tokens,
            users: Arc::new(IdProjector),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_keys(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_users(mut self, users: Arc<dyn UserProjector>) -> Self {
        self.users = users;
        self
    }

    pub fn tokens(&self) -> &TokenConfig {
        &self.tokens
    }

    /// Issue a fresh identifier
    pub fn get_identifier(&self) -> Result<String, SessionError> {
        let mut store = self.store.lock();
        identifier::issue(
            &mut **store,
            self.keys.as_ref(),
            self.clock.now(),
            self.tokens.identifier_ttl(),
        )
    }

    /// Bind the user behind `user_key` to an identifier
    pub fn add_user_data(&self, identifier: &str, user_key: &UserKey) -> Result<(), SessionError> {
        let user = self
            .users
            .project(user_key)
            .ok_or_else(|| SessionError::UnknownUser(user_key.to_string()))?;

        let mut store = self.store.lock();
        identifier::bind_user(&mut **store, identifier, user)
    }

    /// Exchange a claimed identifier for a token pair
    pub fn get_token(&self, identifier: &str) -> Result<TokenBundle, SessionError> {
        self.rotate(identifier)
    }

    /// Refresh a token pair through its update key
    pub fn update_token(&self, update_key: &str) -> Result<TokenBundle, SessionError> {
        self.rotate(update_key)
    }

    pub fn check_token(&self, access_key: &str) -> Result<(), SessionError> {
        let store = self.store.lock();
        validator::check_token(&**store, access_key)
    }

    /// Check that a key exists and is not about to expire
    pub fn check_identifier(&self, identifier: &str) -> Result<String, SessionError> {
        let store = self.store.lock();
        identifier::check(
            &**store,
            identifier,
            self.clock.now(),
            self.tokens.time_delta(),
        )?;
        Ok(identifier.to_string())
    }

    pub fn merge_main_tokens(
        &self,
        primary_main_key: &str,
        other_key: &str,
    ) -> Result<(), SessionError> {
        let mut store = self.store.lock();
        merge::merge_main_tokens(&mut **store, primary_main_key, other_key)
    }

    /// Look up a raw record, bypassing freshness checks
    pub fn record(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.store.lock().get(key)?)
    }

    pub fn record_count(&self) -> Result<usize, SessionError> {
        Ok(self.store.lock().len()?)
    }

    /// Delete every record already past its expiry
    pub fn reap(&self) -> Result<usize, SessionError> {
        let now = self.clock.now();
        Ok(self.store.lock().delete_expired(now)?)
    }

    fn rotate(&self, source_key: &str) -> Result<TokenBundle, SessionError> {
        let mut store = self.store.lock();
        rotation::rotate(
            &mut **store,
            self.keys.as_ref(),
            self.clock.now(),
            &self.tokens,
            source_key,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{capture_logs, test_engine, user};
    use crate::users::UserDirectory;

    #[test]
    fn test_round_trip() {
        let (engine, _clock) = test_engine(["id1", "m1", "a1", "u1"]);

        let identifier = engine.get_identifier().unwrap();
        assert_eq!(identifier, "id1");

        engine.add_user_data(&identifier, &UserKey::Id(1)).unwrap();
        let bundle = engine.get_token(&identifier).unwrap();
        assert_eq!(bundle.token_pair.access_key, "a1");
        assert_eq!(bundle.token_pair.update_key, "u1");
        assert_eq!(bundle.user, user(1));

        engine.check_token("a1").unwrap();

        assert!(matches!(
            engine.get_token(&identifier),
            Err(SessionError::KeyNotFound)
        ));
        assert!(matches!(
            engine.check_identifier(&identifier),
            Err(SessionError::KeyNotFound)
        ));
    }

    #[test]
    fn test_identifier_expires_with_clock() {
        let (engine, clock) = test_engine(["id1", "m1"]);
        engine.get_identifier().unwrap();
        engine.add_user_data("id1", &UserKey::Id(1)).unwrap();

        // Issued at 100 with a 45s ttl and a 1s margin
        clock.set(144);
        assert_eq!(engine.check_identifier("id1").unwrap(), "id1");
        clock.set(145);
        assert!(matches!(
            engine.check_identifier("id1"),
            Err(SessionError::KeyExpired)
        ));
        assert!(matches!(
            engine.get_token("id1"),
            Err(SessionError::KeyExpired)
        ));
    }

    #[test]
    fn test_unknown_user() {
        let (engine, _clock) = test_engine(["id1", "m1"]);
        let engine = engine.with_users(Arc::new(UserDirectory::default()));
        engine.get_identifier().unwrap();

        let err = engine.add_user_data("id1", &UserKey::Id(1)).unwrap_err();
        assert!(matches!(err, SessionError::UnknownUser(ref key) if key == "1"));
        assert!(engine.record("id1").unwrap().unwrap().user().is_none());
    }

    #[test]
    fn test_reap_removes_only_stale_records() {
        let (engine, clock) = test_engine(["id1", "m1", "id2", "m2"]);
        engine.get_identifier().unwrap();
        clock.advance(30);
        engine.get_identifier().unwrap();

        clock.set(146);
        assert_eq!(engine.reap().unwrap(), 1);
        assert!(engine.record("id1").unwrap().is_none());
        assert!(engine.record("id2").unwrap().is_some());
        assert_eq!(engine.record_count().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_rotation_single_winner() {
        let (engine, _clock) = test_engine(["id1", "m1"]);
        let engine = Arc::new(engine);
        engine.get_identifier().unwrap();
        engine.add_user_data("id1", &UserKey::Id(1)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.get_token("id1"))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, SessionError::KeyNotFound)));
    }

    #[test]
    fn test_lifecycle_logs_omit_keys() {
        let (engine, clock) = test_engine([
            "secret-id1",
            "secret-m1",
            "secret-a1",
            "secret-u1",
            "secret-id2",
            "secret-m2",
            "secret-a2",
            "secret-u2",
        ]);

        let ((), logs) = capture_logs(|| {
            engine.get_identifier().unwrap();
            engine.add_user_data("secret-id1", &UserKey::Id(1)).unwrap();
            engine.get_token("secret-id1").unwrap();
            engine.check_token("secret-a1").unwrap();

            engine.get_identifier().unwrap();
            engine.merge_main_tokens("secret-m1", "secret-id2").unwrap();

            clock.advance(100);
            assert!(engine.update_token("secret-u1").is_err());
        });

        assert!(logs.contains("Rotated token pair"));
        assert!(logs.contains("Merged record into lineage"));
        assert!(!logs.contains("secret-"), "{logs}");
    }
}
