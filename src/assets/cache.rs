use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::{
    assets::{
        fetch::{AssetFetcher, HttpFetcher},
        storage::{CacheStorage, DiskStorage, EntryMeta},
    },
    foundation::{config::CacheConfig, error::RouteReelResult},
};

/// Source of "now" for entry timestamps and expiry.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Locally available copy of a remote asset.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssetHandle {
    /// Source URL.
    pub url: String,
    /// Storage handle for the payload (a file path for disk storage).
    pub location: String,
    /// Payload length.
    pub size_bytes: u64,
    /// Store time in Unix epoch milliseconds.
    pub stored_at_ms: u64,
}

impl AssetHandle {
    fn from_meta(meta: &EntryMeta, location: String) -> Self {
        Self {
            url: meta.key.clone(),
            location,
            size_bytes: meta.size_bytes,
            stored_at_ms: meta.stored_at_ms,
        }
    }
}

/// Cumulative batch progress, reported after every completed fetch.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct CacheProgress {
    /// Unique URLs in the batch.
    pub total: usize,
    /// URLs that ended with a local handle.
    pub succeeded: usize,
    /// URLs that did not.
    pub failed: usize,
    /// `(succeeded + failed) / total * 100`; `100` for an empty batch.
    pub percentage: f64,
}

impl CacheProgress {
    fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            percentage: if total == 0 { 100.0 } else { 0.0 },
        }
    }

    fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        let done = self.succeeded + self.failed;
        self.percentage = if done >= self.total {
            100.0
        } else {
            done as f64 / self.total as f64 * 100.0
        };
    }
}

/// Counter snapshot for one cache instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Requests served from a fresh entry.
    pub hits: u64,
    /// Requests that went to the network.
    pub misses: u64,
    /// Network failures and rejected payloads.
    pub fetch_failures: u64,
    /// Store failures that degraded a request to pass-through.
    pub storage_failures: u64,
    /// Entries removed by the size budget.
    pub evictions: u64,
    /// Entries removed for being older than the max age.
    pub expired: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_failures: AtomicU64,
    storage_failures: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

impl Counters {
    fn bump(c: &AtomicU64) {
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

type InFlight = Arc<OnceCell<Option<AssetHandle>>>;

/// URL-keyed asset cache bounded by total size and entry age.
///
/// Failures never surface as errors from the fetch operations: a URL that cannot be fetched
/// or stored yields `None` and the caller keeps using the remote reference.
pub struct AssetCache<S, F, C = SystemClock> {
    config: CacheConfig,
    storage: S,
    fetcher: F,
    clock: C,
    in_flight: Mutex<HashMap<String, InFlight>>,
    counters: Counters,
}

impl AssetCache<DiskStorage, HttpFetcher> {
    /// Disk-backed HTTP cache in the configured (or platform default) directory.
    pub async fn open_disk(config: CacheConfig) -> RouteReelResult<Self> {
        config.validate()?;
        let dir = config.resolve_dir()?;
        let storage = DiskStorage::open(&dir).await?;
        let fetcher = HttpFetcher::new(&config)?;
        tracing::info!(dir = %dir.display(), max_bytes = config.max_bytes, "asset cache ready");
        Ok(Self::new(config, storage, fetcher))
    }
}

impl AssetCache<Option<DiskStorage>, HttpFetcher> {
    /// [`AssetCache::open_disk`] that degrades to pass-through when the store cannot be opened.
    ///
    /// A pass-through cache stores nothing and returns `None` for every URL, so callers keep
    /// the remote references. Invalid configuration still fails.
    pub async fn open_disk_or_pass_through(config: CacheConfig) -> RouteReelResult<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config)?;
        let opened = match config.resolve_dir() {
            Ok(dir) => DiskStorage::open(&dir).await,
            Err(e) => Err(e),
        };
        let storage = match opened {
            Ok(storage) => {
                tracing::info!(dir = %storage.root().display(), max_bytes = config.max_bytes, "asset cache ready");
                Some(storage)
            }
            Err(e) => {
                tracing::warn!(error = %e, "asset cache unavailable; continuing without local copies");
                None
            }
        };
        Ok(Self::new(config, storage, fetcher))
    }
}

impl<S: CacheStorage, F: AssetFetcher> AssetCache<S, F> {
    /// Cache over explicit storage and fetcher, using the wall clock.
    pub fn new(config: CacheConfig, storage: S, fetcher: F) -> Self {
        Self::with_clock(config, storage, fetcher, SystemClock)
    }
}

impl<S: CacheStorage, F: AssetFetcher, C: Clock> AssetCache<S, F, C> {
    /// Cache with an injected clock.
    pub fn with_clock(config: CacheConfig, storage: S, fetcher: F, clock: C) -> Self {
        Self {
            config,
            storage,
            fetcher,
            clock,
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn is_expired(&self, meta: &EntryMeta, now_ms: u64) -> bool {
        now_ms.saturating_sub(meta.stored_at_ms) > self.config.max_age_ms()
    }

    /// Local handle for `url`, fetching and storing it when no fresh entry exists.
    ///
    /// Concurrent calls for the same URL share one fetch.
    pub async fn fetch_and_cache(&self, url: &str) -> Option<AssetHandle> {
        let cell = {
            let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(url.to_string()).or_default().clone()
        };
        let out = cell.get_or_init(|| self.resolve(url)).await.clone();

        let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(url).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            map.remove(url);
        }
        out
    }

    async fn fresh_entry(&self, url: &str) -> Option<EntryMeta> {
        match self.storage.lookup(url).await {
            Ok(Some(meta)) if !self.is_expired(&meta, self.clock.now_ms()) => Some(meta),
            Ok(Some(_)) => {
                Counters::bump(&self.counters.expired);
                tracing::debug!(url, "cache entry expired");
                if let Err(e) = self.storage.delete(url).await {
                    tracing::warn!(url, error = %e, "failed to drop expired entry");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                Counters::bump(&self.counters.storage_failures);
                tracing::warn!(url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn resolve(&self, url: &str) -> Option<AssetHandle> {
        if let Some(meta) = self.fresh_entry(url).await {
            Counters::bump(&self.counters.hits);
            tracing::trace!(url, "cache hit");
            return Some(AssetHandle::from_meta(&meta, self.storage.handle_for(url)));
        }
        Counters::bump(&self.counters.misses);
        if !self.storage.is_available() {
            Counters::bump(&self.counters.storage_failures);
            tracing::debug!(url, "cache store unavailable; passing through");
            return None;
        }

        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                Counters::bump(&self.counters.fetch_failures);
                tracing::warn!(url, error = %e, "asset fetch failed");
                return None;
            }
        };
        if self.config.verify_image_payload && image::guess_format(&bytes).is_err() {
            Counters::bump(&self.counters.fetch_failures);
            tracing::warn!(url, size = bytes.len(), "fetched payload is not an image");
            return None;
        }

        let meta = match self.storage.put(url, &bytes, self.clock.now_ms()).await {
            Ok(meta) => meta,
            Err(e) => {
                Counters::bump(&self.counters.storage_failures);
                tracing::warn!(url, error = %e, "failed to store asset");
                return None;
            }
        };

        let evicted = self.evict().await;
        if evicted.iter().any(|k| k == url) {
            tracing::warn!(url, size = meta.size_bytes, "asset evicted right after store");
            return None;
        }
        Some(AssetHandle::from_meta(&meta, self.storage.handle_for(url)))
    }

    /// Shrink the store to the eviction target, oldest entries first, when over budget.
    ///
    /// Returns the evicted keys.
    pub async fn evict(&self) -> Vec<String> {
        let mut entries = match self.storage.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list cache entries for eviction");
                return Vec::new();
            }
        };
        let mut total: u64 = entries.iter().map(|e| e.size_bytes).sum();
        if total <= self.config.max_bytes {
            return Vec::new();
        }

        let target = self.config.evict_target_bytes();
        entries.sort_by(|a, b| {
            a.stored_at_ms
                .cmp(&b.stored_at_ms)
                .then_with(|| a.key.cmp(&b.key))
        });

        let mut evicted = Vec::new();
        for entry in entries {
            if total <= target {
                break;
            }
            match self.storage.delete(&entry.key).await {
                Ok(_) => {
                    total = total.saturating_sub(entry.size_bytes);
                    Counters::bump(&self.counters.evictions);
                    evicted.push(entry.key);
                }
                Err(e) => tracing::warn!(key = %entry.key, error = %e, "eviction delete failed"),
            }
        }
        tracing::info!(evicted = evicted.len(), remaining_bytes = total, target, "evicted cache entries");
        evicted
    }

    /// Stored bytes for `url` when a fresh entry exists.
    pub async fn read_payload(&self, url: &str) -> Option<Vec<u8>> {
        self.fresh_entry(url).await?;
        match self.storage.read(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                Counters::bump(&self.counters.storage_failures);
                tracing::warn!(url, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Fetch every URL in bounded concurrent batches.
    ///
    /// Repeated URLs are fetched once. `on_progress` runs after every completion with
    /// cumulative totals. URLs that fail are absent from the result.
    pub async fn fetch_batch<I>(
        &self,
        urls: I,
        on_progress: impl FnMut(CacheProgress),
    ) -> HashMap<String, AssetHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.fetch_batch_with_cancel(urls, &CancellationToken::new(), on_progress)
            .await
    }

    /// [`AssetCache::fetch_batch`] that stops once `cancel` fires.
    ///
    /// Fetches still running at cancellation are dropped; completed ones are returned.
    #[tracing::instrument(skip_all)]
    pub async fn fetch_batch_with_cancel<I>(
        &self,
        urls: I,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(CacheProgress),
    ) -> HashMap<String, AssetHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<String> = urls
            .into_iter()
            .map(|u| u.as_ref().to_string())
            .filter(|u| seen.insert(u.clone()))
            .collect();

        let mut progress = CacheProgress::new(unique.len());
        let mut out = HashMap::with_capacity(unique.len());
        let mut cancelled = false;

        'batches: for chunk in unique.chunks(self.config.batch_size.max(1)) {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let mut pending: FuturesUnordered<_> = chunk
                .iter()
                .map(|url| async move { (url, self.fetch_and_cache(url).await) })
                .collect();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = pending.next() => Some(next),
                };
                match next {
                    None => {
                        cancelled = true;
                        break 'batches;
                    }
                    Some(None) => break,
                    Some(Some((url, handle))) => {
                        progress.record(handle.is_some());
                        if let Some(handle) = handle {
                            out.insert(url.clone(), handle);
                        }
                        on_progress(progress);
                    }
                }
            }
        }

        if cancelled {
            tracing::info!(completed = progress.succeeded + progress.failed, total = progress.total, "batch fetch cancelled");
        } else {
            tracing::info!(succeeded = progress.succeeded, failed = progress.failed, "batch fetch done");
        }
        out
    }

    /// Remove every stored entry.
    pub async fn clear(&self) -> RouteReelResult<()> {
        self.storage.clear().await?;
        tracing::info!("asset cache cleared");
        Ok(())
    }

    /// Persist storage state and release the cache.
    pub async fn teardown(self) -> RouteReelResult<()> {
        self.storage.flush().await?;
        tracing::debug!(stats = ?self.counters.snapshot(), "asset cache torn down");
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
