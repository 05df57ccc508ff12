//! Local snapshot cache.
//!
//! The whole collection is persisted as a single snapshot blob under one
//! storage key. Snapshots are read and replaced wholesale; nothing in this
//! module mutates a stored snapshot in place.
//!
//! - `snapshot`: the persisted unit and its metadata
//! - `store`: read/write/clear with corruption and quota recovery
//! - `validity`: TTL check
//! - `merge`: combine a cached snapshot with an incremental delta

pub mod merge;
pub mod snapshot;
pub mod store;
pub mod validity;

pub use merge::{merge, Delta};
pub use snapshot::{Snapshot, SnapshotMetadata};
pub use store::CacheStore;
pub use validity::is_fresh;
