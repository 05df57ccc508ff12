//! Sync orchestration.
//!
//! `SyncOrchestrator` coordinates the cache store, the TTL check, the merger
//! and the record source: serve a fresh local snapshot instantly and refresh
//! it in the background, or fall back to a synchronous full fetch when no
//! usable snapshot exists.
//!
//! Background outcomes are published on an injected event channel rather than
//! through shared mutable flags; the composition root owns the receiver and
//! decides how to present them.

pub mod orchestrator;

pub use orchestrator::SyncOrchestrator;

use thiserror::Error;

use crate::cache::Snapshot;
use crate::models::{Note, NoteTag, Tag};
use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// A remote fetch failed with no cached data to fall back on, or the
    /// direct write path failed. Background refresh failures never surface
    /// here - they arrive as `SyncEvent::RefreshFailed`.
    #[error("Remote source error: {0}")]
    Source(#[from] SourceError),
}

/// What the caller displays: the record, tag and link sets of one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionView {
    pub records: Vec<Note>,
    pub tags: Vec<Tag>,
    pub associations: Vec<NoteTag>,
}

impl From<&Snapshot> for CollectionView {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            records: snapshot.records.clone(),
            tags: snapshot.tags.clone(),
            associations: snapshot.associations.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Served from the local snapshot with zero network wait; a background
    /// refresh has been started.
    Cache,
    /// Fetched from the remote source synchronously.
    Remote,
}

/// Result of a `fetch` call.
#[derive(Debug)]
pub struct LoadOutcome {
    pub view: CollectionView,
    pub origin: LoadOrigin,
    /// False when the snapshot could not be persisted locally. Non-fatal:
    /// the returned view is unaffected.
    pub persisted: bool,
}

/// Notifications from background work.
///
/// Visible data only ever moves forward: a `Refreshed` view supersedes the
/// stale one, while `RefreshFailed` and `PersistFailed` leave whatever is
/// currently displayed untouched.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Background refresh merged new data; replace the displayed view.
    Refreshed(CollectionView),
    /// Background refresh exhausted its retries; keep showing the stale view.
    RefreshFailed { error: String },
    /// A snapshot could not be written locally; in-memory data is intact.
    PersistFailed,
}
