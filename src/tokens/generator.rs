use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;

use crate::config::KeyFormat;

/// Source of opaque, collision-free record keys
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Generate a random UUIDv4 key
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a secure random key of `len` bytes, hex encoded
pub fn generate_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// Random keys in the configured format
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeys {
    format: KeyFormat,
}

impl RandomKeys {
    pub fn new(format: KeyFormat) -> Self {
        Self { format }
    }
}

impl KeyGenerator for RandomKeys {
    fn generate(&self) -> String {
        match self.format {
            KeyFormat::Uuid => generate_uuid(),
            KeyFormat::Hex => generate_hex(32),
        }
    }
}

/// Hands out a fixed list of keys in order, then `key-N` once exhausted.
///
/// Lets tests predict every key the engine mints.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    inner: Mutex<ScriptedState>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    counter: usize,
    queue: VecDeque<String>,
}

impl ScriptedKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Mutex::new(ScriptedState {
                counter: 0,
                queue: keys.into_iter().map(Into::into).collect(),
            }),
        }
    }

    /// Append more keys to the script
    pub fn push<S: Into<String>>(&self, key: S) {
        self.inner.lock().queue.push_back(key.into());
    }
}

impl KeyGenerator for ScriptedKeys {
    fn generate(&self) -> String {
        let mut state = self.inner.lock();
        match state.queue.pop_front() {
            Some(key) => key,
            None => {
                let key = format!("key-{}", state.counter);
                state.counter += 1;
                key
            }
        }
    }
}
