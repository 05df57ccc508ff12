use tracing::{debug, warn};

use crate::storage::Storage;

use super::Snapshot;

/// Sentinel key for the availability probe. Written and removed immediately;
/// never holds data.
const PROBE_KEY: &str = "__songcache_probe";
const PROBE_VALUE: &str = "1";

/// Snapshot store over a `Storage` port.
///
/// Every failure mode is recovered here: corruption clears the store, a
/// quota error gets one clear-and-retry, and nothing is ever raised to the
/// caller. The API is deliberately infallible — `get` degrades to `None`,
/// `put` degrades to `false`.
pub struct CacheStore<S: Storage> {
    storage: S,
    key: String,
    expected_version: String,
}

impl<S: Storage> CacheStore<S> {
    pub fn new(storage: S, key: impl Into<String>, expected_version: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            expected_version: expected_version.into(),
        }
    }

    /// Probe the backing store with a trivial write-then-remove. A store
    /// that fails the probe is treated as absent, not as an error.
    pub fn is_available(&self) -> bool {
        match self
            .storage
            .write(PROBE_KEY, PROBE_VALUE)
            .and_then(|_| self.storage.remove(PROBE_KEY))
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Storage probe failed, proceeding without cache");
                false
            }
        }
    }

    /// Read the stored snapshot. Absent, unreadable, or corrupted all come
    /// back as `None`; corruption additionally clears the store so the next
    /// write starts clean.
    pub fn get(&self) -> Option<Snapshot> {
        let blob = match self.storage.read(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached snapshot");
                return None;
            }
        };

        match serde_json::from_str::<Snapshot>(&blob) {
            Ok(snapshot) => {
                if snapshot.metadata.version != self.expected_version {
                    // Schema tag mismatch is informational until a migration
                    // actually exists.
                    debug!(
                        found = %snapshot.metadata.version,
                        expected = %self.expected_version,
                        "Cached snapshot has a different schema version"
                    );
                }
                debug!(
                    records = snapshot.records.len(),
                    tags = snapshot.tags.len(),
                    "Loaded cached snapshot"
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Cached snapshot is corrupted, clearing");
                self.clear();
                None
            }
        }
    }

    /// Serialize and write the snapshot, replacing whatever was stored.
    ///
    /// On a quota error the store is cleared once and the write retried
    /// exactly once. Returns `false` when the snapshot could not be
    /// persisted; the caller's in-memory copy is unaffected either way.
    pub fn put(&self, snapshot: &Snapshot) -> bool {
        let blob = match serde_json::to_string(snapshot) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to serialize snapshot");
                return false;
            }
        };

        match self.storage.write(&self.key, &blob) {
            Ok(()) => true,
            Err(e) if e.is_quota() => {
                warn!("Storage quota exceeded, clearing cache and retrying write");
                self.clear();
                match self.storage.write(&self.key, &blob) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "Snapshot write failed after quota recovery");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to write snapshot");
                false
            }
        }
    }

    /// Best-effort removal; errors are logged and swallowed.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            debug!(error = %e, "Failed to clear cached snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Note, NoteTag, Tag};
    use crate::storage::{MemoryStorage, Storage, StorageError};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn store(storage: MemoryStorage) -> CacheStore<MemoryStorage> {
        CacheStore::new(storage, "songbook_cache", "1")
    }

    fn sample_snapshot() -> Snapshot {
        let note_id = Uuid::new_v4();
        let tag_id = Uuid::new_v4();
        Snapshot::from_full_fetch(
            vec![Note {
                id: note_id,
                title: "Blackbird".to_string(),
                content: "G Am7 G/B G".to_string(),
                artist: Some("The Beatles".to_string()),
                album: None,
                release_year: Some(1968),
                metadata: None,
                references: None,
                is_pinned: true,
                created_at: Utc::now(),
                updated_at: Some(Utc::now()),
            }],
            vec![Tag { id: tag_id, name: "fingerstyle".to_string() }],
            vec![NoteTag { note_id, tag_id }],
            "1".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn test_get_absent_returns_none() {
        assert!(store(MemoryStorage::new()).get().is_none());
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let store = store(MemoryStorage::new());
        let snapshot = sample_snapshot();
        assert!(store.put(&snapshot));
        assert_eq!(store.get().unwrap(), snapshot);
    }

    #[test]
    fn test_non_json_blob_is_cleared() {
        let storage = MemoryStorage::new();
        storage.write("songbook_cache", "not json at all").unwrap();
        let store = store(storage);
        assert!(store.get().is_none());
        // The corrupted blob must be gone afterwards
        assert!(store.storage.read("songbook_cache").unwrap().is_none());
    }

    #[test]
    fn test_structurally_incomplete_blob_is_cleared() {
        let storage = MemoryStorage::new();
        // Valid JSON but missing the associations and metadata fields
        storage
            .write("songbook_cache", r#"{"records": [], "tags": []}"#)
            .unwrap();
        let store = store(storage);
        assert!(store.get().is_none());
    }

    #[test]
    fn test_clear_leaves_store_empty() {
        let store = store(MemoryStorage::new());
        assert!(store.put(&sample_snapshot()));
        store.clear();
        assert!(store.get().is_none());
    }

    /// Fails the first `failures` writes with a quota error, then delegates.
    struct QuotaFlakyStorage {
        inner: MemoryStorage,
        failures: AtomicUsize,
        removed: AtomicUsize,
    }

    impl QuotaFlakyStorage {
        fn failing(failures: usize) -> Self {
            Self {
                inner: MemoryStorage::new(),
                failures: AtomicUsize::new(failures),
                removed: AtomicUsize::new(0),
            }
        }
    }

    impl Storage for QuotaFlakyStorage {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.read(key)
        }
        fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::QuotaExceeded);
            }
            self.inner.write(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.removed.fetch_add(1, Ordering::SeqCst);
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_quota_clear_and_retry_succeeds() {
        // First write throws quota, the post-clear retry lands. The store
        // must end up holding exactly the new snapshot.
        let snapshot = sample_snapshot();
        let store = CacheStore::new(QuotaFlakyStorage::failing(1), "songbook_cache", "1");
        assert!(store.put(&snapshot));
        assert_eq!(store.storage.removed.load(Ordering::SeqCst), 1);
        assert_eq!(store.storage.inner.len(), 1);
        assert_eq!(store.get().unwrap(), snapshot);
    }

    #[test]
    fn test_quota_exhausted_after_retry_returns_false() {
        // Both the write and the single post-clear retry hit the quota.
        let store = CacheStore::new(QuotaFlakyStorage::failing(2), "songbook_cache", "1");
        assert!(!store.put(&sample_snapshot()));
        // Exactly one clear-and-retry, never more
        assert_eq!(store.storage.removed.load(Ordering::SeqCst), 1);
        assert!(store.get().is_none());
    }

    #[test]
    fn test_is_available_on_working_store() {
        assert!(store(MemoryStorage::new()).is_available());
    }

    struct FailingStorage {
        writes: AtomicUsize,
    }

    impl Storage for FailingStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Unavailable("down".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }
    }

    #[test]
    fn test_unavailable_storage_never_raises() {
        let store = CacheStore::new(FailingStorage { writes: AtomicUsize::new(0) }, "k", "1");
        assert!(!store.is_available());
        assert!(store.get().is_none());
        assert!(!store.put(&sample_snapshot()));
        store.clear();
        // Non-quota write errors must not trigger the clear-and-retry path
        assert_eq!(store.storage.writes.load(Ordering::SeqCst), 2);
    }
}
