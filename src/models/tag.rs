use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-defined label. Tags carry no edit timestamp, so they are always
/// fetched in full rather than incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// A note-to-tag link. Links have no state of their own: a pair either
/// exists or it does not, which is why merging unions them as a set.
/// Ordered so merged snapshots come out in a deterministic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteTag {
    #[serde(rename = "recordId")]
    pub note_id: Uuid,
    #[serde(rename = "tagId")]
    pub tag_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_note_tag_set_semantics() {
        let note_id = Uuid::new_v4();
        let tag_id = Uuid::new_v4();
        let mut set = HashSet::new();
        set.insert(NoteTag { note_id, tag_id });
        set.insert(NoteTag { note_id, tag_id });
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_note_tag_ordering_is_deterministic() {
        let a = NoteTag {
            note_id: Uuid::from_u128(1),
            tag_id: Uuid::from_u128(2),
        };
        let b = NoteTag {
            note_id: Uuid::from_u128(1),
            tag_id: Uuid::from_u128(3),
        };
        let c = NoteTag {
            note_id: Uuid::from_u128(2),
            tag_id: Uuid::from_u128(1),
        };
        let ordered: Vec<NoteTag> = std::collections::BTreeSet::from([c, b, a])
            .into_iter()
            .collect();
        assert_eq!(ordered, vec![a, b, c]);
    }

    #[test]
    fn test_note_tag_serialized_field_names() {
        let link = NoteTag {
            note_id: Uuid::nil(),
            tag_id: Uuid::nil(),
        };
        let json = serde_json::to_string(&link).unwrap();
        assert!(json.contains("recordId"));
        assert!(json.contains("tagId"));
    }
}
