//! PostgREST-backed record source.
//!
//! Talks to the Supabase REST endpoint for the `notes`, `tags` and
//! `note_tags` tables. Reads are offset/limit paginated with a stable
//! `order=id.asc` so successive pages never overlap; incremental reads filter
//! server-side on `updated_at=gt.<iso>`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Note, NoteTag, Tag};

use super::{Page, RecordSource, SourceError};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Record source over a Supabase PostgREST endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct SupabaseSource {
    client: Client,
    base_url: String,
    api_key: String,
    token: String,
}

impl SupabaseSource {
    /// Create a source against `<base_url>/rest/v1`. The token is the
    /// caller's access token; authentication itself is out of scope here.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            token: token.into(),
        })
    }

    /// Swap in a refreshed access token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            token: token.into(),
        }
    }

    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, SourceError> {
        let mut headers = header::HeaderMap::new();
        let bearer = format!("Bearer {}", self.token);
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&self.api_key)
                .map_err(|e| SourceError::InvalidResponse(e.to_string()))?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&bearer)
                .map_err(|e| SourceError::InvalidResponse(e.to_string()))?,
        );
        Ok(headers)
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SourceError::from_status(status, &body))
        }
    }

    /// GET with 429 retry. Other failures propagate immediately.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .query(query)
                .send()
                .await?;

            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(SourceError::RateLimited);
                }
                warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let response = Self::check_response(response).await?;
            return response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse(format!("{} from {}", e, url)));
        }
    }

    fn page_query(offset: usize, limit: usize) -> Vec<(&'static str, String)> {
        vec![
            ("order", "id.asc".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ]
    }

    fn iso(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Wire shape of a `note_tags` row - internal only, domain code uses `NoteTag`.
#[derive(Debug, Deserialize)]
struct NoteTagRow {
    note_id: Uuid,
    tag_id: Uuid,
}

#[async_trait]
impl RecordSource for SupabaseSource {
    async fn notes_page(&self, offset: usize, limit: usize) -> Result<Page<Note>, SourceError> {
        let query = Self::page_query(offset, limit);
        let items: Vec<Note> = self.get_json(&self.url("notes"), &query).await?;
        debug!(offset, count = items.len(), "Notes page received");
        Ok(Page::from_items(items, limit))
    }

    async fn notes_since_page(
        &self,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Note>, SourceError> {
        let mut query = Self::page_query(offset, limit);
        query.push(("updated_at", format!("gt.{}", Self::iso(since))));
        let items: Vec<Note> = self.get_json(&self.url("notes"), &query).await?;
        debug!(offset, count = items.len(), since = %since, "Changed-notes page received");
        Ok(Page::from_items(items, limit))
    }

    async fn tags_page(&self, offset: usize, limit: usize) -> Result<Page<Tag>, SourceError> {
        let query = Self::page_query(offset, limit);
        let items: Vec<Tag> = self.get_json(&self.url("tags"), &query).await?;
        Ok(Page::from_items(items, limit))
    }

    async fn links_page(
        &self,
        offset: usize,
        limit: usize,
        restrict_to: Option<&[Uuid]>,
    ) -> Result<Page<NoteTag>, SourceError> {
        let mut query = Self::page_query(offset, limit);
        query.push(("select", "note_id,tag_id".to_string()));
        if let Some(ids) = restrict_to {
            let list = ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            query.push(("note_id", format!("in.({})", list)));
        }
        let rows: Vec<NoteTagRow> = self.get_json(&self.url("note_tags"), &query).await?;
        let items = rows
            .into_iter()
            .map(|r| NoteTag { note_id: r.note_id, tag_id: r.tag_id })
            .collect();
        Ok(Page::from_items(items, limit))
    }

    async fn create_note(&self, note: &Note) -> Result<(), SourceError> {
        let response = self
            .client
            .post(self.url("notes"))
            .headers(self.auth_headers()?)
            .header("Prefer", "return=minimal")
            .json(note)
            .send()
            .await?;
        Self::check_response(response).await?;
        debug!(note_id = %note.id, "Note created");
        Ok(())
    }

    async fn update_note(&self, note: &Note) -> Result<(), SourceError> {
        let response = self
            .client
            .patch(self.url("notes"))
            .headers(self.auth_headers()?)
            .query(&[("id", format!("eq.{}", note.id))])
            .header("Prefer", "return=minimal")
            .json(note)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::InvalidResponse(format!(
                "Note {} does not exist on the remote source",
                note.id
            )));
        }
        Self::check_response(response).await?;
        debug!(note_id = %note.id, "Note updated");
        Ok(())
    }
}
