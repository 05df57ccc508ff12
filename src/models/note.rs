use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A song note as stored in the remote collection.
///
/// `updated_at` is optional: rows imported from the original notes export
/// never received an edit timestamp, so incremental sync must tolerate its
/// absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    /// Free-text header block (key, capo, chords used).
    #[serde(default)]
    pub metadata: Option<String>,
    /// Reference URLs, one per line.
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default, rename = "isPinned")]
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn display_title(&self) -> String {
        match &self.artist {
            Some(artist) => format!("{} — {}", self.title, artist),
            None => self.title.clone(),
        }
    }
}
