/*!
Single-file record store adapter.
*/

use super::RecordStore;
use crate::{Result, VaultError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Record store persisted as one JSON object file mapping key to raw value.
///
/// The whole map is read on every access and rewritten on every mutation.
/// That is deliberately simple: record sets here are small (a handful of
/// keys holding UI-scale JSON blobs), and the full rewrite gives
/// last-write-wins semantics with no partial-file states to reason about.
///
/// # Example
/// ```
/// use snapvault_core::store::{FileRecordStore, RecordStore};
///
/// # let dir = tempfile::tempdir().unwrap();
/// # let path = dir.path().join("store.json");
/// let store = FileRecordStore::new(&path);
/// store.set("2dNumbers", r#"{"07":"sold"}"#)?;
/// assert!(store.get("2dNumbers")?.is_some());
/// # Ok::<(), snapvault_core::VaultError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    /// Create a store backed by the given file. The file is created on the
    /// first write; a missing file reads as an empty store.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| {
            VaultError::storage(format!(
                "Failed to read record store {}: {}",
                self.path.display(),
                e
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            VaultError::storage(format!(
                "Record store {} is not a valid key-value file: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    VaultError::storage(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        let text = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, text).map_err(|e| {
            VaultError::storage(format!(
                "Failed to write record store {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl RecordStore for FileRecordStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.to_string());
        self.save_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.load_map()?;
        if map.remove(key).is_some() {
            self.save_map(&map)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.load_map()?.keys().cloned().collect())
    }
}
