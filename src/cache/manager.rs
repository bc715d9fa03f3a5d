// Resource cache manager.
// Serves content from the persisted store while fresh and falls back to a deduplicated fetch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::config::Config;
use crate::error::{RemoteSvgError, Result};
use crate::fetch::{Deduplicator, Fetcher};
use crate::store::KeyValueStore;

use super::entry::{CacheEntry, DEFAULT_FRESHNESS, encode_timestamp};
use super::keys;
use super::sweep::{SweepCoordinator, purge_cache_keys};

/// Placeholder served when a resource cannot be retrieved.
pub const DEFAULT_FALLBACK_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#;

/// Per-call resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Age beyond which cached content is refetched.
    pub freshness: Duration,
    /// Whether to consult and populate the persisted store.
    pub cacheable: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            freshness: DEFAULT_FRESHNESS,
            cacheable: true,
        }
    }
}

impl ResolveOptions {
    pub fn with_freshness_secs(secs: u64) -> Self {
        Self {
            freshness: Duration::from_secs(secs),
            ..Self::default()
        }
    }

    /// Always fetch, never touch the store.
    pub fn uncached() -> Self {
        Self {
            cacheable: false,
            ..Self::default()
        }
    }
}

/// A persisted entry together with the cache key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub cache_key: String,
    #[serde(flatten)]
    pub entry: CacheEntry,
}

/// Resolves resource identifiers to content through the persisted cache.
pub struct ResourceCache {
    store: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn Fetcher>,
    dedup: Deduplicator,
    sweep: Arc<SweepCoordinator>,
    fallback: String,
}

impl ResourceCache {
    /// Create a cache with its own deduplicator and sweep coordinator.
    pub fn new(store: Arc<dyn KeyValueStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            store,
            fetcher,
            dedup: Deduplicator::new(),
            sweep: Arc::new(SweepCoordinator::default()),
            fallback: DEFAULT_FALLBACK_SVG.to_string(),
        }
    }

    /// Create a cache using the sweep interval and fallback from `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self::new(store, fetcher)
            .with_sweep(Arc::new(SweepCoordinator::new(config.reset_interval())))
            .with_fallback(config.fallback_svg.clone())
    }

    /// Share a sweep coordinator with other caches.
    pub fn with_sweep(mut self, sweep: Arc<SweepCoordinator>) -> Self {
        self.sweep = sweep;
        self
    }

    /// Share in-flight deduplication with other caches.
    pub fn with_deduplicator(mut self, dedup: Deduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn sweep(&self) -> &Arc<SweepCoordinator> {
        &self.sweep
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Number of retrievals currently in flight.
    pub fn in_flight(&self) -> usize {
        self.dedup.in_flight()
    }

    /// Resolve `identifier` to content, never failing.
    ///
    /// A retrieval failure is logged and the fallback placeholder returned in
    /// its place. The placeholder is never persisted.
    pub async fn resolve(&self, identifier: &str, options: ResolveOptions) -> String {
        match self.try_resolve(identifier, options).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(identifier, error = %e, "Failed to retrieve resource, using fallback");
                self.fallback.clone()
            }
        }
    }

    /// Resolve `identifier` to content, propagating retrieval failures.
    ///
    /// An empty identifier resolves to empty content without touching the
    /// store or the network. Store failures never surface here; they only
    /// turn into cache misses or dropped writes.
    pub async fn try_resolve(&self, identifier: &str, options: ResolveOptions) -> Result<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            tracing::debug!("Ignoring empty resource identifier");
            return Ok(String::new());
        }

        let cache_key = if options.cacheable {
            keys::cache_key(identifier)
        } else {
            None
        };

        if let Some(cache_key) = cache_key {
            self.sweep.activate(self.store.as_ref()).await;

            if let Some(entry) = self.lookup(cache_key).await {
                let age = entry.age_at(Utc::now());
                let age_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX);
                if age < options.freshness {
                    tracing::debug!(cache_key, age_ms, "Cache hit");
                    return Ok(entry.content);
                }
                tracing::debug!(cache_key, age_ms, "Cache stale");
            } else {
                tracing::debug!(cache_key, "Cache miss");
            }
        }

        self.fetch(identifier, cache_key).await
    }

    /// Remove the cached entry for `identifier`.
    ///
    /// Returns `false` when no cache key can be derived from the identifier.
    pub async fn invalidate(&self, identifier: &str) -> Result<bool> {
        let Some(cache_key) = keys::cache_key(identifier) else {
            return Ok(false);
        };

        self.store.delete(&keys::content_key(cache_key)).await?;
        self.store.delete(&keys::timestamp_key(cache_key)).await?;
        Ok(true)
    }

    /// Delete every cached entry. The global sweep timestamp is kept.
    pub async fn clear(&self) -> Result<usize> {
        purge_cache_keys(self.store.as_ref()).await
    }

    /// List complete persisted entries, ordered by cache key.
    pub async fn entries(&self) -> Result<Vec<StoredEntry>> {
        let stored_keys = self.store.list_keys().await?;

        let mut cache_keys: Vec<&str> = stored_keys
            .iter()
            .filter_map(|k| keys::cache_key_of_content(k))
            .collect();
        cache_keys.sort_unstable();

        let mut entries = Vec::with_capacity(cache_keys.len());
        for cache_key in cache_keys {
            if let Some(entry) = self.lookup(cache_key).await {
                entries.push(StoredEntry {
                    cache_key: cache_key.to_string(),
                    entry,
                });
            }
        }
        Ok(entries)
    }

    /// Read content and timestamp for `cache_key`. Any failure is a miss.
    async fn lookup(&self, cache_key: &str) -> Option<CacheEntry> {
        let content_key = keys::content_key(cache_key);
        let timestamp_key = keys::timestamp_key(cache_key);

        let (content, timestamp) = tokio::join!(
            self.store.get(&content_key),
            self.store.get(&timestamp_key)
        );

        let content = content
            .map_err(|e| tracing::warn!(cache_key, error = %e, "Failed to read cached content"))
            .ok()?;
        let timestamp = timestamp
            .map_err(|e| tracing::warn!(cache_key, error = %e, "Failed to read cache timestamp"))
            .ok()?;

        CacheEntry::from_parts(content, timestamp)
    }

    /// Retrieve through the deduplicator, persisting the result when `cache_key` is set.
    async fn fetch(&self, identifier: &str, cache_key: Option<&str>) -> Result<String> {
        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let target = identifier.to_string();
        let cache_key = cache_key.map(str::to_string);

        self.dedup
            .retrieve(identifier, move || async move {
                let content = fetcher.fetch(&target).await?;
                if let Some(cache_key) = cache_key {
                    persist(store.as_ref(), &cache_key, &content).await;
                }
                Ok::<_, RemoteSvgError>(content)
            })
            .await
    }
}

/// Write content and store time. Failures are logged and dropped.
async fn persist(store: &dyn KeyValueStore, cache_key: &str, content: &str) {
    let written = async {
        store.set(&keys::content_key(cache_key), content).await?;
        store
            .set(&keys::timestamp_key(cache_key), &encode_timestamp(Utc::now()))
            .await
    };

    match written.await {
        Ok(()) => tracing::trace!(cache_key, "Persisted cache entry"),
        Err(e) => tracing::warn!(cache_key, error = %e, "Failed to persist cache entry"),
    }
}
