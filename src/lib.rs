//! songcache - client-side cache and incremental sync for a remote songbook.
//!
//! The engine keeps a persistent local snapshot of the remote collection
//! (notes, tags, note-tag links) and keeps it fresh with minimal network
//! traffic. A fresh snapshot is served with zero network wait while an
//! incremental refresh runs in the background; a missing, stale or corrupted
//! snapshot falls back to a synchronous full fetch.
//!
//! ```no_run
//! use songcache::config::SyncConfig;
//! use songcache::source::SupabaseSource;
//! use songcache::storage::FileStorage;
//! use songcache::sync::SyncOrchestrator;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
//! let source = SupabaseSource::new("https://project.supabase.co", "anon-key", "token")?;
//! let orchestrator = SyncOrchestrator::new(
//!     FileStorage::in_default_location()?,
//!     source,
//!     SyncConfig::default(),
//!     events_tx,
//! );
//!
//! let outcome = orchestrator.fetch(false).await?;
//! // display outcome.view; apply events_rx updates as they arrive
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod models;
pub mod source;
pub mod storage;
pub mod sync;

pub use cache::{CacheStore, Delta, Snapshot, SnapshotMetadata};
pub use config::SyncConfig;
pub use models::{Note, NoteTag, Tag};
pub use source::{Page, RecordSource, SourceError, SupabaseSource};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use sync::{CollectionView, LoadOrigin, LoadOutcome, SyncError, SyncEvent, SyncOrchestrator};
