//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tempfile::TempDir;

use crate::clock::{from_seconds, ManualClock};
use crate::config::{Config, ServerConfig, StorageConfig, TokenConfig};
use crate::engine::SessionEngine;
use crate::storage::models::{IdentifierRecord, SessionRecord, UserSummary};
use crate::storage::{Database, MemoryStore};
use crate::tokens::ScriptedKeys;
use crate::users::{UserDirectory, UserKey};
use crate::AppState;

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard; the caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// Unix seconds as a timestamp
pub fn at(seconds: i64) -> DateTime<Utc> {
    from_seconds(seconds)
}

/// The summary the test user directory projects for `id`
pub fn user(id: i64) -> UserSummary {
    let value = json!({
        "access": [1, 2, 3],
        "id": id,
        "level": 5,
        "name": "User name",
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// A directory knowing users 1, 2 and 11
pub fn test_directory() -> UserDirectory {
    let mut directory = UserDirectory::default();
    for id in [1, 2, 11] {
        directory.insert(UserKey::Id(id), user(id));
    }
    directory
}

/// An identifier record issued 45 seconds before `expires_at`
pub fn make_identifier(
    key: &str,
    main_key: &str,
    expires_at: i64,
    user: Option<UserSummary>,
) -> SessionRecord {
    SessionRecord::Identifier(IdentifierRecord {
        created_at: at(expires_at - 45),
        expires_at: at(expires_at),
        key: key.to_string(),
        main_key: main_key.to_string(),
        user,
    })
}

/// A memory-backed engine at t=100 with scripted keys and the test directory.
pub fn test_engine<I, S>(keys: I) -> (SessionEngine, Arc<ManualClock>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let clock = Arc::new(ManualClock::at(100));
    let engine = SessionEngine::new(Box::new(MemoryStore::new()), TokenConfig::default())
        .with_clock(clock.clone())
        .with_keys(Arc::new(ScriptedKeys::new(keys)))
        .with_users(Arc::new(test_directory()));
    (engine, clock)
}

/// A minimal `Config` suitable for unit tests (memory store, reaper off).
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:5011".to_string(),
        },
        storage: StorageConfig::default(),
        tokens: TokenConfig {
            cleanup_interval_seconds: 0,
            ..TokenConfig::default()
        },
        users_file: None,
    }
}

/// Build a full `Arc<AppState>` around a scripted engine.
pub fn test_state<I, S>(keys: I) -> (Arc<AppState>, Arc<ManualClock>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let (engine, clock) = test_engine(keys);
    let state = Arc::new(AppState {
        config: test_config(),
        engine,
    });
    (state, clock)
}

/// Log sink shared between a test and the subscriber it installs
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every log event down to TRACE captured as plain text.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&capture.0.lock()).into_owned();
    (result, logs)
}
