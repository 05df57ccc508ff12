use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use super::{Storage, StorageError};

/// Application name used for the default cache directory path
const APP_NAME: &str = "songcache";

/// File-backed store: one file per key under a cache directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store under the platform cache directory, e.g.
    /// `~/.cache/songcache` on Linux.
    pub fn in_default_location() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Self::new(cache_dir.join(APP_NAME))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn classify(err: std::io::Error) -> StorageError {
        // ENOSPC and EDQUOT both surface as out-of-space conditions.
        match err.kind() {
            ErrorKind::StorageFull | ErrorKind::QuotaExceeded => StorageError::QuotaExceeded,
            ErrorKind::PermissionDenied => StorageError::Unavailable(err.to_string()),
            _ => StorageError::Io(err),
        }
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::classify(e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        debug!(key, bytes = value.len(), "Writing cache file");
        std::fs::write(&path, value).map_err(Self::classify)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::classify(e)),
        }
    }
}
