//! File-backed durable key/value store
//!
//! Stand-in for the browser's per-origin durable storage: one JSON file per
//! hosting application, loaded once, flushed on every write. Read failures
//! degrade to an empty map with a log line - the storage contract forbids
//! surfacing errors, a corrupt file must never block login.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use stayport_common::storage::KeyValueStore;
use tracing::warn;

/// Durable key/value store persisted as a single JSON object
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open (or create) the store at the given path
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path);
        Self { path, entries: Mutex::new(entries) }
    }

    fn load(path: &Path) -> HashMap<String, String> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read store file, starting empty");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Store file is corrupt, starting empty");
                HashMap::new()
            }
        }
    }

    /// Write-then-rename so a crash mid-flush never corrupts the store
    fn flush(&self, entries: &HashMap<String, String>) {
        let raw = match serde_json::to_string_pretty(entries) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Failed to serialize store, skipping flush");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %err, "Failed to create store directory");
                return;
            }
        }
        let tmp = self.path.with_extension("tmp");
        if let Err(err) = fs::write(&tmp, raw) {
            warn!(path = %tmp.display(), error = %err, "Failed to write store file");
            return;
        }
        if let Err(err) = fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %err, "Failed to replace store file");
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the file store.
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn values_survive_a_reopen() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("store.json");

        let store = FileKeyValueStore::open(&path);
        store.set("stayport.hotel.session", "{\"user_id\":\"u1\"}");
        drop(store);

        let reopened = FileKeyValueStore::open(&path);
        assert_eq!(
            reopened.get("stayport.hotel.session").as_deref(),
            Some("{\"user_id\":\"u1\"}")
        );
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("store.json");
        fs::write(&path, "{broken json").expect("write corrupt file");

        let store = FileKeyValueStore::open(&path);
        assert!(store.get("anything").is_none());

        // The store must still accept writes afterwards.
        store.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn remove_persists() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("store.json");

        let store = FileKeyValueStore::open(&path);
        store.set("k", "v");
        store.remove("k");
        drop(store);

        let reopened = FileKeyValueStore::open(&path);
        assert!(reopened.get("k").is_none());
    }

    #[test]
    fn missing_parent_directory_is_created() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("deeper").join("store.json");

        let store = FileKeyValueStore::open(&path);
        store.set("k", "v");

        let reopened = FileKeyValueStore::open(&path);
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
    }
}
