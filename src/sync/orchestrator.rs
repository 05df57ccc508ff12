use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{is_fresh, merge, CacheStore, Delta, Snapshot};
use crate::config::SyncConfig;
use crate::models::Note;
use crate::source::{
    fetch_all_links, fetch_all_notes, fetch_all_tags, fetch_notes_since, RecordSource, SourceError,
};
use crate::storage::Storage;

use super::{CollectionView, LoadOrigin, LoadOutcome, SyncError, SyncEvent};

/// Top-level sync coordinator.
///
/// A fresh cached snapshot is served with zero network wait and reconciled by
/// a background incremental fetch; anything else falls through to a
/// synchronous full fetch. All cache failures are absorbed along the way -
/// the only error a caller ever sees is a remote failure with nothing local
/// to fall back on.
pub struct SyncOrchestrator<S: Storage + 'static, R: RecordSource + 'static> {
    cache: Arc<CacheStore<S>>,
    source: Arc<R>,
    config: SyncConfig,
    events: UnboundedSender<SyncEvent>,
    /// Handle of the most recent background refresh. There is no cancellation:
    /// a started refresh runs to completion or retry exhaustion. Callers are
    /// expected not to overlap `fetch` calls.
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Storage + 'static, R: RecordSource + 'static> SyncOrchestrator<S, R> {
    pub fn new(
        storage: S,
        source: R,
        config: SyncConfig,
        events: UnboundedSender<SyncEvent>,
    ) -> Self {
        let cache = CacheStore::new(storage, config.cache_key.clone(), config.schema_version.clone());
        Self {
            cache: Arc::new(cache),
            source: Arc::new(source),
            config,
            events,
            refresh_task: Mutex::new(None),
        }
    }

    /// Load the collection.
    ///
    /// With a fresh cached snapshot this returns immediately from local
    /// storage and spawns an incremental refresh. Otherwise (no snapshot,
    /// stale snapshot, failed storage probe, or `force_full`) it clears any
    /// leftover snapshot and performs a full fetch; a remote failure on that
    /// path is fatal for the call.
    pub async fn fetch(&self, force_full: bool) -> Result<LoadOutcome, SyncError> {
        let available = self.cache.is_available();

        let cached = if available && !force_full {
            self.cache.get()
        } else {
            None
        };

        if let Some(snapshot) = cached {
            if is_fresh(&snapshot.metadata, self.config.ttl(), Utc::now()) {
                info!(
                    records = snapshot.records.len(),
                    cached_at = %snapshot.metadata.cached_at,
                    "Serving cached snapshot, refreshing in background"
                );
                let view = CollectionView::from(&snapshot);
                self.spawn_incremental_refresh(snapshot).await;
                return Ok(LoadOutcome {
                    view,
                    origin: LoadOrigin::Cache,
                    persisted: true,
                });
            }
            debug!(cached_at = %snapshot.metadata.cached_at, "Cached snapshot expired");
            self.cache.clear();
        } else if available {
            // force_full, or an invalid blob already cleared by the store;
            // make sure nothing stale survives the full fetch.
            self.cache.clear();
        }

        let snapshot = self.full_fetch().await?;
        let view = CollectionView::from(&snapshot);
        let persisted = self.cache.put(&snapshot);
        if !persisted {
            warn!("Full fetch succeeded but the snapshot could not be persisted");
            self.emit(SyncEvent::PersistFailed);
        }

        Ok(LoadOutcome {
            view,
            origin: LoadOrigin::Remote,
            persisted,
        })
    }

    /// Write a note straight to the remote source, then reconcile the local
    /// cache and view against the authoritative remote state.
    ///
    /// No optimistic cache mutation and no retry: a failed write surfaces
    /// directly to the caller.
    pub async fn save(&self, note: &Note, is_update: bool) -> Result<LoadOutcome, SyncError> {
        if is_update {
            self.source.update_note(note).await?;
        } else {
            self.source.create_note(note).await?;
        }
        info!(note_id = %note.id, is_update, "Note saved, reconciling cache");
        self.fetch(false).await
    }

    /// Wait for the in-flight background refresh, if any. Useful on shutdown
    /// and in tests; a refresh is never cancelled.
    pub async fn wait_for_refresh(&self) {
        let handle = self.refresh_task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background refresh task panicked");
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // The receiver may be gone during shutdown; nothing to do then.
        if self.events.send(event).is_err() {
            debug!("Sync event dropped - receiver closed");
        }
    }

    async fn full_fetch(&self) -> Result<Snapshot, SyncError> {
        let page_size = self.config.page_size;
        info!("Starting full fetch");

        let (records, tags, associations) = tokio::try_join!(
            fetch_all_notes(&*self.source, page_size),
            fetch_all_tags(&*self.source, page_size),
            fetch_all_links(&*self.source, page_size, None),
        )?;

        info!(
            records = records.len(),
            tags = tags.len(),
            associations = associations.len(),
            "Full fetch complete"
        );

        Ok(Snapshot::from_full_fetch(
            records,
            tags,
            associations,
            self.config.schema_version.clone(),
            Utc::now(),
        ))
    }

    async fn spawn_incremental_refresh(&self, cached: Snapshot) {
        let cache = Arc::clone(&self.cache);
        let source = Arc::clone(&self.source);
        let config = self.config.clone();
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            Self::run_incremental_refresh(cache, source, config, events, cached).await;
        });
        *self.refresh_task.lock().await = Some(handle);
    }

    /// Bounded retry loop around one incremental attempt: the initial try
    /// plus `refresh_retries` more, with a fixed delay in between. Exhaustion
    /// leaves the displayed stale snapshot exactly as it was.
    async fn run_incremental_refresh(
        cache: Arc<CacheStore<S>>,
        source: Arc<R>,
        config: SyncConfig,
        events: UnboundedSender<SyncEvent>,
        cached: Snapshot,
    ) {
        let mut last_error: Option<SourceError> = None;

        for attempt in 0..=config.refresh_retries {
            if attempt > 0 {
                debug!(attempt, "Retrying incremental refresh");
                tokio::time::sleep(config.retry_delay).await;
            }

            match Self::incremental_attempt(&cache, &*source, &config, &events, &cached).await {
                Ok(Some(view)) => {
                    info!(records = view.records.len(), "Incremental refresh merged new data");
                    let _ = events.send(SyncEvent::Refreshed(view));
                    return;
                }
                Ok(None) => {
                    debug!("Incremental refresh found no changes");
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Incremental refresh attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        warn!(error = %error, "Incremental refresh exhausted retries, keeping stale snapshot");
        let _ = events.send(SyncEvent::RefreshFailed { error });
    }

    /// One incremental attempt: changed notes since the cached watermark,
    /// the full tag list, and only the links touching the changed notes.
    /// Returns `Ok(None)` when the delta is empty - the cache is not
    /// rewritten and the displayed snapshot stays untouched.
    async fn incremental_attempt(
        cache: &CacheStore<S>,
        source: &R,
        config: &SyncConfig,
        events: &UnboundedSender<SyncEvent>,
        cached: &Snapshot,
    ) -> Result<Option<CollectionView>, SourceError> {
        let page_size = config.page_size;
        let since = cached.metadata.last_update_timestamp;

        let records = fetch_notes_since(source, since, page_size).await?;
        let tags = fetch_all_tags(source, page_size).await?;
        let associations = if records.is_empty() {
            // No changed notes means no link could have changed either.
            Vec::new()
        } else {
            let ids: Vec<_> = records.iter().map(|n| n.id).collect();
            fetch_all_links(source, page_size, Some(&ids)).await?
        };

        let delta = Delta { records, tags, associations };
        if delta.is_empty() {
            return Ok(None);
        }

        let merged = merge(cached, &delta, Utc::now());
        if !cache.put(&merged) {
            // The view still moves forward; only persistence is degraded.
            warn!("Merged snapshot could not be persisted");
            let _ = events.send(SyncEvent::PersistFailed);
        }

        Ok(Some(CollectionView::from(&merged)))
    }
}
