//! Storage port for the snapshot cache.
//!
//! The cache never talks to a backing store directly; it goes through the
//! `Storage` trait so the engine runs unchanged against an in-memory fake in
//! tests and a file-backed store in the application.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store refused the write for lack of space.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// The backing store cannot be reached at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Quota errors get one clear-and-retry in the cache store; everything
    /// else fails the write outright.
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded)
    }
}

/// Minimal key-value port. Implementations serialize their own reads and
/// writes; callers treat every value as an opaque whole.
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
