use std::collections::HashMap;
use std::sync::Mutex;

use super::{Storage, StorageError};

/// In-memory store used by tests and as a degraded fallback when no
/// filesystem location is available.
///
/// An optional byte capacity makes quota exhaustion reproducible: a write
/// that would push the total stored size past the limit fails with
/// `QuotaExceeded`, exactly like a browser localStorage quota.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn used_bytes(entries: &HashMap<String, String>) -> usize {
        entries.values().map(|v| v.len()).sum()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(capacity) = self.capacity_bytes {
            let existing = entries.get(key).map(|v| v.len()).unwrap_or(0);
            if Self::used_bytes(&entries) - existing + value.len() > capacity {
                return Err(StorageError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
