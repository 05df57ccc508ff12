use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Note, NoteTag, Tag};

/// The persisted unit: the complete local copy of the remote collection.
///
/// All four fields are mandatory. A stored blob missing any of them fails to
/// parse and is treated as corrupted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<Note>,
    pub tags: Vec<Tag>,
    pub associations: Vec<NoteTag>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Wall-clock time this snapshot was written.
    #[serde(rename = "cachedAt")]
    pub cached_at: DateTime<Utc>,
    /// Maximum `updated_at` observed among the records present when the
    /// snapshot was built. Incremental fetches resume from here.
    #[serde(rename = "lastUpdateTimestamp")]
    pub last_update_timestamp: DateTime<Utc>,
    /// Schema tag for future migrations. Compared on read, not enforced.
    pub version: String,
}

impl Snapshot {
    /// Assemble a snapshot from a full fetch.
    ///
    /// `last_update_timestamp` is the newest `updated_at` among the fetched
    /// records, or the Unix epoch when none carries one (a later incremental
    /// fetch then sees every timestamped record as new, which is harmless).
    pub fn from_full_fetch(
        records: Vec<Note>,
        tags: Vec<Tag>,
        associations: Vec<NoteTag>,
        version: String,
        now: DateTime<Utc>,
    ) -> Self {
        let last_update_timestamp = records
            .iter()
            .filter_map(|n| n.updated_at)
            .max()
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self {
            records,
            tags,
            associations,
            metadata: SnapshotMetadata {
                cached_at: now,
                last_update_timestamp,
                version,
            },
        }
    }
}
