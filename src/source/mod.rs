//! Record source gateway.
//!
//! The sync engine never talks HTTP directly; it drives the `RecordSource`
//! trait page by page. A page shorter than the requested limit ends the
//! sequence, so an immediately short (possibly empty) first page means the
//! source has no data. `SupabaseSource` is the production implementation.

pub mod supabase;

pub use supabase::SupabaseSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Note, NoteTag, Tag};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl SourceError {
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            // Back off to a char boundary so a multibyte character straddling
            // the cutoff cannot panic the slice.
            let mut cut = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => SourceError::Unauthorized,
            403 => SourceError::AccessDenied(truncated),
            429 => SourceError::RateLimited,
            500..=599 => SourceError::ServerError(truncated),
            _ => SourceError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

/// One page of a paginated read, plus whether more pages follow.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// A full page may be followed by more; a short one never is.
    pub fn from_items(items: Vec<T>, limit: usize) -> Self {
        let has_more = items.len() >= limit;
        Self { items, has_more }
    }
}

/// Paginated readers over the remote collection, plus the direct write path.
///
/// Notes support both full and since-timestamp reads. Tags carry no edit
/// timestamp, so only a full read exists for them. The link reader accepts an
/// optional note-id restriction so an incremental sync never re-fetches links
/// for untouched notes.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn notes_page(&self, offset: usize, limit: usize) -> Result<Page<Note>, SourceError>;

    /// Notes whose `updated_at` is strictly greater than `since`.
    async fn notes_since_page(
        &self,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Note>, SourceError>;

    async fn tags_page(&self, offset: usize, limit: usize) -> Result<Page<Tag>, SourceError>;

    async fn links_page(
        &self,
        offset: usize,
        limit: usize,
        restrict_to: Option<&[Uuid]>,
    ) -> Result<Page<NoteTag>, SourceError>;

    async fn create_note(&self, note: &Note) -> Result<(), SourceError>;

    async fn update_note(&self, note: &Note) -> Result<(), SourceError>;
}

#[async_trait]
impl<T: RecordSource + ?Sized> RecordSource for std::sync::Arc<T> {
    async fn notes_page(&self, offset: usize, limit: usize) -> Result<Page<Note>, SourceError> {
        (**self).notes_page(offset, limit).await
    }

    async fn notes_since_page(
        &self,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Note>, SourceError> {
        (**self).notes_since_page(since, offset, limit).await
    }

    async fn tags_page(&self, offset: usize, limit: usize) -> Result<Page<Tag>, SourceError> {
        (**self).tags_page(offset, limit).await
    }

    async fn links_page(
        &self,
        offset: usize,
        limit: usize,
        restrict_to: Option<&[Uuid]>,
    ) -> Result<Page<NoteTag>, SourceError> {
        (**self).links_page(offset, limit, restrict_to).await
    }

    async fn create_note(&self, note: &Note) -> Result<(), SourceError> {
        (**self).create_note(note).await
    }

    async fn update_note(&self, note: &Note) -> Result<(), SourceError> {
        (**self).update_note(note).await
    }
}

/// Drive a page reader to completion.
async fn collect_pages<T, F, Fut>(limit: usize, mut fetch: F) -> Result<Vec<T>, SourceError>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>, SourceError>>,
{
    let mut items = Vec::new();
    let mut offset = 0;
    loop {
        let page = fetch(offset).await?;
        let fetched = page.items.len();
        offset += fetched;
        items.extend(page.items);
        if !page.has_more || fetched < limit {
            break;
        }
    }
    Ok(items)
}

pub async fn fetch_all_notes<R: RecordSource + ?Sized>(
    source: &R,
    page_size: usize,
) -> Result<Vec<Note>, SourceError> {
    let notes = collect_pages(page_size, |offset| source.notes_page(offset, page_size)).await?;
    debug!(count = notes.len(), "Fetched full note list");
    Ok(notes)
}

pub async fn fetch_notes_since<R: RecordSource + ?Sized>(
    source: &R,
    since: DateTime<Utc>,
    page_size: usize,
) -> Result<Vec<Note>, SourceError> {
    let notes = collect_pages(page_size, |offset| {
        source.notes_since_page(since, offset, page_size)
    })
    .await?;
    debug!(count = notes.len(), since = %since, "Fetched changed notes");
    Ok(notes)
}

pub async fn fetch_all_tags<R: RecordSource + ?Sized>(
    source: &R,
    page_size: usize,
) -> Result<Vec<Tag>, SourceError> {
    collect_pages(page_size, |offset| source.tags_page(offset, page_size)).await
}

pub async fn fetch_all_links<R: RecordSource + ?Sized>(
    source: &R,
    page_size: usize,
    restrict_to: Option<&[Uuid]>,
) -> Result<Vec<NoteTag>, SourceError> {
    collect_pages(page_size, |offset| {
        source.links_page(offset, page_size, restrict_to)
    })
    .await
}
