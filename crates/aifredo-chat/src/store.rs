//! Storage port for client-local persisted state.
//!
//! The daily quota counter (and anything else a host UI wants to keep
//! across runs) goes through the small `KvStore` interface, so the
//! persistence mechanism can be swapped without touching call sites.
//! `FileStore` keeps one JSON object on disk; `MemoryStore` backs
//! tests and throwaway embeddings.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no usable data directory on this system")]
    NoDataDir,
}

/// Key-value storage port.
pub trait KvStore: Send + Sync {
    /// Read a value. Missing keys and unreadable backends both read
    /// as `None`; persisted state is never load-bearing enough to
    /// fail a chat session over.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("store lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("store lock poisoned").remove(key);
        Ok(())
    }
}

/// File-backed store: a single JSON object of string keys to string
/// values, rewritten on every set. Reads of a missing or corrupt file
/// yield an empty map.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default store location under the user data directory.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let mut dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        dir.push("aifredo");
        dir.push("store.json");
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.load();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("k").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.clear("k").unwrap();
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));
        store.set("af-msg-count", r#"{"date":"2026-01-01","count":3}"#).unwrap();
        assert!(store.get("af-msg-count").unwrap().contains("2026-01-01"));

        // A second handle over the same file sees the write.
        let other = FileStore::new(dir.path().join("store.json"));
        assert_eq!(other.get("af-msg-count"), store.get("af-msg-count"));
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::new(&path);
        assert!(store.get("anything").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
