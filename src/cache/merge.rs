use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::models::{Note, NoteTag, Tag};

use super::Snapshot;

/// An incremental fetch result: records changed since the cached
/// `last_update_timestamp`, the full tag list, and the links touching the
/// changed records.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    pub records: Vec<Note>,
    pub tags: Vec<Tag>,
    pub associations: Vec<NoteTag>,
}

impl Delta {
    /// A delta with no changed records and no changed links is a no-op; the
    /// cached snapshot stays as it is. Tags alone never force a rewrite
    /// because they only change alongside the notes referencing them.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.associations.is_empty()
    }
}

/// Combine a cached snapshot with a freshly fetched delta.
///
/// Records and tags are overlaid by id with the delta unconditionally
/// replacing the cached version — source-wins, no timestamp comparison.
/// Tags and links carry no timestamp at all, so there is nothing to compare;
/// switching records to timestamp-wins would leave the rule inconsistent
/// across entity kinds. Links are unioned as a set of pairs.
///
/// The merged record-id set is exactly the union of the two input id sets,
/// each id appearing once.
pub fn merge(cached: &Snapshot, delta: &Delta, now: DateTime<Utc>) -> Snapshot {
    let mut records: BTreeMap<_, _> = cached.records.iter().map(|n| (n.id, n.clone())).collect();
    for note in &delta.records {
        records.insert(note.id, note.clone());
    }

    let mut tags: BTreeMap<_, _> = cached.tags.iter().map(|t| (t.id, t.clone())).collect();
    for tag in &delta.tags {
        tags.insert(tag.id, tag.clone());
    }

    let associations: BTreeSet<NoteTag> = cached
        .associations
        .iter()
        .chain(delta.associations.iter())
        .copied()
        .collect();

    let last_update_timestamp = records
        .values()
        .filter_map(|n| n.updated_at)
        .max()
        .unwrap_or(cached.metadata.last_update_timestamp);

    let mut metadata = cached.metadata.clone();
    metadata.cached_at = now;
    metadata.last_update_timestamp = last_update_timestamp;

    Snapshot {
        records: records.into_values().collect(),
        tags: tags.into_values().collect(),
        associations: associations.into_iter().collect(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SnapshotMetadata;
    use chrono::TimeZone;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn note(id: Uuid, title: &str, updated_at: Option<DateTime<Utc>>) -> Note {
        Note {
            id,
            title: title.to_string(),
            content: String::new(),
            artist: None,
            album: None,
            release_year: None,
            metadata: None,
            references: None,
            is_pinned: false,
            created_at: Utc::now(),
            updated_at,
        }
    }

    fn snapshot(records: Vec<Note>, tags: Vec<Tag>, associations: Vec<NoteTag>) -> Snapshot {
        Snapshot {
            records,
            tags,
            associations,
            metadata: SnapshotMetadata {
                cached_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                last_update_timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                version: "1".to_string(),
            },
        }
    }

    #[test]
    fn test_merged_ids_are_union_each_once() {
        let shared = Uuid::new_v4();
        let only_cached = Uuid::new_v4();
        let only_delta = Uuid::new_v4();
        let cached = snapshot(
            vec![note(shared, "old", None), note(only_cached, "kept", None)],
            vec![],
            vec![],
        );
        let delta = Delta {
            records: vec![note(shared, "new", None), note(only_delta, "added", None)],
            ..Delta::default()
        };

        let merged = merge(&cached, &delta, Utc::now());

        assert_eq!(merged.records.len(), 3);
        let ids: BTreeSet<_> = merged.records.iter().map(|n| n.id).collect();
        assert_eq!(ids, BTreeSet::from([shared, only_cached, only_delta]));
    }

    #[test]
    fn test_delta_wins_on_collision() {
        let id = Uuid::new_v4();
        let cached = snapshot(vec![note(id, "cached version", None)], vec![], vec![]);
        let delta = Delta {
            records: vec![note(id, "delta version", None)],
            ..Delta::default()
        };

        let merged = merge(&cached, &delta, Utc::now());

        let kept = merged.records.iter().find(|n| n.id == id).unwrap();
        assert_eq!(kept.title, "delta version");
    }

    #[test]
    fn test_delta_wins_even_when_older() {
        // Source-wins, not timestamp-wins: an older delta record still
        // replaces the cached one.
        let id = Uuid::new_v4();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let cached = snapshot(vec![note(id, "newer", Some(newer))], vec![], vec![]);
        let delta = Delta {
            records: vec![note(id, "older", Some(older))],
            ..Delta::default()
        };

        let merged = merge(&cached, &delta, Utc::now());

        assert_eq!(merged.records[0].title, "older");
        // But the watermark still reflects the max across the merged set
        assert_eq!(merged.metadata.last_update_timestamp, older);
    }

    #[test]
    fn test_tags_overlaid_by_id() {
        let id = Uuid::new_v4();
        let cached = snapshot(
            vec![],
            vec![Tag { id, name: "folk".to_string() }],
            vec![],
        );
        let delta = Delta {
            tags: vec![Tag { id, name: "folk-rock".to_string() }],
            // A non-empty record delta so the merge is not skipped upstream
            records: vec![note(Uuid::new_v4(), "n", None)],
            ..Delta::default()
        };

        let merged = merge(&cached, &delta, Utc::now());

        assert_eq!(merged.tags.len(), 1);
        assert_eq!(merged.tags[0].name, "folk-rock");
    }

    #[test]
    fn test_associations_unioned_without_duplicates() {
        let pair = NoteTag { note_id: Uuid::new_v4(), tag_id: Uuid::new_v4() };
        let other = NoteTag { note_id: Uuid::new_v4(), tag_id: Uuid::new_v4() };
        let cached = snapshot(vec![], vec![], vec![pair]);
        let delta = Delta {
            associations: vec![pair, other],
            ..Delta::default()
        };

        let merged = merge(&cached, &delta, Utc::now());

        assert_eq!(merged.associations.len(), 2);
    }

    #[test]
    fn test_watermark_falls_back_to_previous_when_untimestamped() {
        let cached = snapshot(vec![note(Uuid::new_v4(), "a", None)], vec![], vec![]);
        let prior = cached.metadata.last_update_timestamp;
        let delta = Delta {
            records: vec![note(Uuid::new_v4(), "b", None)],
            ..Delta::default()
        };

        let merged = merge(&cached, &delta, Utc::now());

        assert_eq!(merged.metadata.last_update_timestamp, prior);
    }

    #[test]
    fn test_merge_refreshes_cached_at_keeps_version() {
        let cached = snapshot(vec![], vec![], vec![]);
        let now = Utc.with_ymd_and_hms(2025, 2, 2, 12, 0, 0).unwrap();
        let merged = merge(&cached, &Delta::default(), now);
        assert_eq!(merged.metadata.cached_at, now);
        assert_eq!(merged.metadata.version, "1");
    }

    #[test]
    fn test_delta_is_empty_ignores_tags() {
        let delta = Delta {
            tags: vec![Tag { id: Uuid::new_v4(), name: "only-tags".to_string() }],
            ..Delta::default()
        };
        assert!(delta.is_empty());
    }
}
