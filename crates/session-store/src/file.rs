use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::{KeyValueStore, Result, SessionStoreError};

/// Key-value store persisted as a JSON object in a single file.
///
/// Entries are cached in memory and the whole file is rewritten on every
/// mutation through a temporary file and a rename, so a crash never leaves a
/// half-written session behind. This is what lets a restarted process recover
/// the checkout session it was in the middle of.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: Arc<PathBuf>,
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FileKeyValueStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
                SessionStoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(SessionStoreError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened session file");

        Ok(Self {
            path: Arc::new(path),
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");

        std::fs::write(&tmp, contents).map_err(|source| SessionStoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, self.path.as_path()).map_err(|source| SessionStoreError::Io {
            path: self.path.to_path_buf(),
            source,
        })
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("session-store-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let path = temp_path();
        let store = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_path();
        {
            let store = FileKeyValueStore::open(&path).unwrap();
            store.set("payment-session-id", "1700000000000").unwrap();
            store.set("transaction-1700000000000", "txn-1").unwrap();
        }

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("transaction-1700000000000").unwrap().as_deref(),
            Some("txn-1")
        );

        reopened.remove("transaction-1700000000000").unwrap();
        let again = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(again.get("transaction-1700000000000").unwrap(), None);
        assert_eq!(
            again.get("payment-session-id").unwrap().as_deref(),
            Some("1700000000000")
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();

        let result = FileKeyValueStore::open(&path);
        assert!(matches!(result, Err(SessionStoreError::Corrupt { .. })));

        std::fs::remove_file(&path).unwrap();
    }
}
