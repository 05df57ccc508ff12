//! Sync engine configuration.
//!
//! All tuning knobs live here so callers supply them at composition time
//! rather than the algorithms hard-coding them.

use std::time::Duration;

/// Consider a cached snapshot stale after 30 days.
/// The collection changes rarely; a long TTL keeps startup instant while the
/// background refresh catches the occasional edit.
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Remote page size. 900 stays under the PostgREST max-rows limit while
/// fetching a typical collection in a single page.
pub const DEFAULT_PAGE_SIZE: usize = 900;

/// Extra attempts for a failed background refresh.
/// 3 retries ride out transient network loss without hammering the server.
pub const DEFAULT_REFRESH_RETRIES: u32 = 3;

/// Fixed delay between background refresh attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Storage key the snapshot blob is persisted under.
pub const DEFAULT_CACHE_KEY: &str = "songbook_cache";

/// Snapshot schema tag. Compared on read for future migrations, not yet
/// enforced.
pub const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub ttl_days: i64,
    pub page_size: usize,
    pub cache_key: String,
    pub schema_version: String,
    pub refresh_retries: u32,
    pub retry_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ttl_days: DEFAULT_TTL_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            refresh_retries: DEFAULT_REFRESH_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl SyncConfig {
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl_days = days;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.ttl_days)
    }
}
