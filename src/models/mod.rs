//! Data models for songbook entities.
//!
//! This module contains the data structures synchronized from the remote
//! collection:
//!
//! - `Note`: a song note with content and optional release metadata
//! - `Tag`: a user-defined label
//! - `NoteTag`: a note-to-tag link

pub mod note;
pub mod tag;

pub use note::Note;
pub use tag::{NoteTag, Tag};
