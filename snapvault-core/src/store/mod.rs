/*!
Record store adapters for durable key-value persistence.

This module defines the record store abstraction (port) and concrete
implementations (adapters). The vault engine is independent of where the
key-value records actually live, which keeps it testable against an
in-memory double.
*/

pub mod file;

use crate::Result;

/// Durable mapping from string keys to string values.
///
/// Values are raw strings; whether a value is JSON is the caller's concern.
/// The store is assumed to be accessed from a single logical thread of
/// control, matching the single-tab execution model of the application.
pub trait RecordStore {
    /// Read the value stored under a key, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value under a key, overwriting any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// List every key currently present.
    fn keys(&self) -> Result<Vec<String>>;
}

pub use file::FileRecordStore;

/// Memory-backed record store for tests and test doubles.
pub struct MemoryRecordStore {
    data: std::sync::Mutex<std::collections::BTreeMap<String, String>>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            data: std::sync::Mutex::new(std::collections::BTreeMap::new()),
        }
    }

    /// Snapshot of the full store contents, for before/after comparisons.
    pub fn dump(&self) -> std::collections::BTreeMap<String, String> {
        self.data.lock().unwrap().clone()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.data.lock().unwrap().keys().cloned().collect())
    }
}
