//! Key-value persistence behind the tracker.
//!
//! Each entity collection is serialized as one JSON blob under a single key.
//! The store is the only shared resource; both backends serialize access
//! through an interior mutex so a read-modify-write on a collection cannot
//! interleave with another writer in the same process.

use crate::error::{LiferError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage contract: whole-value get/set by key.
///
/// Missing keys are read as empty-collection defaults by the helpers below.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Deserialize the value under `key`, if present.
pub fn read<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Deserialize the value under `key`, falling back to `T::default()`.
pub fn read_or_default<T: DeserializeOwned + Default>(store: &dyn Store, key: &str) -> Result<T> {
    Ok(read(store, key)?.unwrap_or_default())
}

/// Serialize `value` under `key`.
pub fn write<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<()> {
    store.set(key, &serde_json::to_string(value)?)
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.map
            .lock()
            .map_err(|_| LiferError::Storage("memory store lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// File-backed store: one JSON file per key under a data directory.
///
/// Writes go through a temp file then rename, so a crash mid-write leaves
/// the previous value intact.
pub struct FileStore {
    dir: PathBuf,
    // Serializes writers; file renames are atomic but read-modify-write
    // sequences across keys are not.
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| LiferError::Storage("file store lock poisoned".to_string()))?;
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| LiferError::Storage("file store lock poisoned".to_string()))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| LiferError::Storage("file store lock poisoned".to_string()))?;
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        write(&store, "numbers", &vec![1u32, 2, 3]).unwrap();
        let back: Vec<u32> = read_or_default(&store, "numbers").unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn missing_key_reads_as_default() {
        let store = MemoryStore::new();
        let empty: Vec<String> = read_or_default(&store, "nothing").unwrap();
        assert!(empty.is_empty());
        assert_eq!(read::<Vec<String>>(&store, "nothing").unwrap(), None);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        write(&store, "tasks", &vec!["a".to_string()]).unwrap();
        let back: Vec<String> = read_or_default(&store, "tasks").unwrap();
        assert_eq!(back, vec!["a".to_string()]);
        assert_eq!(store.keys().unwrap(), vec!["tasks".to_string()]);
    }
}
