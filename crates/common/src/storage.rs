//! Synchronous string-keyed storage
//!
//! The session core persists small JSON blobs through this trait. Operations
//! are infallible by contract: adapters absorb their own failures (a corrupt
//! or unreadable entry degrades to "absent" with a log line) because a broken
//! cache must never block login.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Synchronous string-keyed storage
///
/// Implementations must never panic and never surface errors; `get` on a
/// missing or unreadable key returns `None`.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when absent
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, overwriting any previous one
    fn set(&self, key: &str, value: &str);

    /// Remove a value; removing a missing key is a no-op
    fn remove(&self, key: &str);
}

/// In-memory store
///
/// Serves as the ephemeral (per-process) storage scope in production and as
/// the durable-store stand-in under test.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the stored keys, for assertions in tests
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
