use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::foundation::error::{RouteReelError, RouteReelResult};

const INDEX_FILE: &str = "index.json";
const INDEX_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Metadata of one stored payload.
pub struct EntryMeta {
    /// Source URL.
    pub key: String,
    /// Store time in Unix epoch milliseconds.
    pub stored_at_ms: u64,
    /// Payload length.
    pub size_bytes: u64,
}

/// Persistent key → payload table used by the asset cache.
///
/// One entry per key; `put` on an existing key replaces payload, timestamp and size.
pub trait CacheStorage {
    /// Metadata for `key`, if stored.
    fn lookup(&self, key: &str) -> impl Future<Output = RouteReelResult<Option<EntryMeta>>>;

    /// Payload for `key`, if stored.
    fn read(&self, key: &str) -> impl Future<Output = RouteReelResult<Option<Vec<u8>>>>;

    /// Store `payload` under `key`, replacing any previous entry.
    fn put(
        &self,
        key: &str,
        payload: &[u8],
        stored_at_ms: u64,
    ) -> impl Future<Output = RouteReelResult<EntryMeta>>;

    /// Remove `key`; returns whether it was present.
    fn delete(&self, key: &str) -> impl Future<Output = RouteReelResult<bool>>;

    /// Metadata of every stored entry.
    fn entries(&self) -> impl Future<Output = RouteReelResult<Vec<EntryMeta>>>;

    /// Remove everything.
    fn clear(&self) -> impl Future<Output = RouteReelResult<()>>;

    /// Local handle a consumer can use to reach the payload of `key`.
    fn handle_for(&self, key: &str) -> String;

    /// Persist any buffered state.
    fn flush(&self) -> impl Future<Output = RouteReelResult<()>> {
        async { Ok(()) }
    }

    /// Whether the store accepts entries at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// `None` is a store that could not be opened: nothing is ever stored and every lookup misses.
impl<S: CacheStorage> CacheStorage for Option<S> {
    async fn lookup(&self, key: &str) -> RouteReelResult<Option<EntryMeta>> {
        match self {
            Some(s) => s.lookup(key).await,
            None => Ok(None),
        }
    }

    async fn read(&self, key: &str) -> RouteReelResult<Option<Vec<u8>>> {
        match self {
            Some(s) => s.read(key).await,
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, payload: &[u8], stored_at_ms: u64) -> RouteReelResult<EntryMeta> {
        match self {
            Some(s) => s.put(key, payload, stored_at_ms).await,
            None => Err(RouteReelError::cache_storage("cache store unavailable")),
        }
    }

    async fn delete(&self, key: &str) -> RouteReelResult<bool> {
        match self {
            Some(s) => s.delete(key).await,
            None => Ok(false),
        }
    }

    async fn entries(&self) -> RouteReelResult<Vec<EntryMeta>> {
        match self {
            Some(s) => s.entries().await,
            None => Ok(Vec::new()),
        }
    }

    async fn clear(&self) -> RouteReelResult<()> {
        match self {
            Some(s) => s.clear().await,
            None => Ok(()),
        }
    }

    fn handle_for(&self, key: &str) -> String {
        self.as_ref().map(|s| s.handle_for(key)).unwrap_or_default()
    }

    async fn flush(&self) -> RouteReelResult<()> {
        match self {
            Some(s) => s.flush().await,
            None => Ok(()),
        }
    }

    fn is_available(&self) -> bool {
        self.as_ref().is_some_and(S::is_available)
    }
}

fn lock<T>(m: &Mutex<T>) -> RouteReelResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| RouteReelError::cache_storage("storage lock poisoned"))
}

fn storage_io(what: &str, path: &Path, e: std::io::Error) -> RouteReelError {
    RouteReelError::cache_storage(format!("{what} '{}': {e}", path.display()))
}

/// Stable payload file name for a key.
pub fn file_name_for(key: &str) -> String {
    format!("{:016x}.bin", xxhash_rust::xxh3::xxh3_64(key.as_bytes()))
}

/// Process-local table; contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, (EntryMeta, Arc<Vec<u8>>)>>,
}

impl MemoryStorage {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryStorage {
    async fn lookup(&self, key: &str) -> RouteReelResult<Option<EntryMeta>> {
        Ok(lock(&self.entries)?.get(key).map(|(m, _)| m.clone()))
    }

    async fn read(&self, key: &str) -> RouteReelResult<Option<Vec<u8>>> {
        Ok(lock(&self.entries)?
            .get(key)
            .map(|(_, bytes)| bytes.as_ref().clone()))
    }

    async fn put(&self, key: &str, payload: &[u8], stored_at_ms: u64) -> RouteReelResult<EntryMeta> {
        let meta = EntryMeta {
            key: key.to_string(),
            stored_at_ms,
            size_bytes: payload.len() as u64,
        };
        lock(&self.entries)?.insert(key.to_string(), (meta.clone(), Arc::new(payload.to_vec())));
        Ok(meta)
    }

    async fn delete(&self, key: &str) -> RouteReelResult<bool> {
        Ok(lock(&self.entries)?.remove(key).is_some())
    }

    async fn entries(&self) -> RouteReelResult<Vec<EntryMeta>> {
        Ok(lock(&self.entries)?
            .values()
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn clear(&self) -> RouteReelResult<()> {
        lock(&self.entries)?.clear();
        Ok(())
    }

    fn handle_for(&self, key: &str) -> String {
        format!("memory://{}", file_name_for(key))
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct IndexEntry {
    file: String,
    stored_at_ms: u64,
    size_bytes: u64,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct IndexFile {
    version: u32,
    entries: BTreeMap<String, IndexEntry>,
}

/// Directory-backed table: one payload file per key plus a JSON index.
///
/// Payload and index writes go through a temporary file and a rename, so a crash leaves either
/// the old or the new version on disk.
#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
    index: Mutex<BTreeMap<String, IndexEntry>>,
    persist: tokio::sync::Mutex<()>,
    tmp_seq: AtomicU64,
}

impl DiskStorage {
    /// Open (creating if needed) the store rooted at `root`.
    ///
    /// A missing or unreadable index starts the store empty; index entries whose payload file
    /// is gone are dropped.
    pub async fn open(root: impl Into<PathBuf>) -> RouteReelResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| storage_io("create cache dir", &root, e))?;

        let index_path = root.join(INDEX_FILE);
        let mut entries = match tokio::fs::read(&index_path).await {
            Ok(bytes) => match serde_json::from_slice::<IndexFile>(&bytes) {
                Ok(idx) if idx.version == INDEX_VERSION => idx.entries,
                Ok(idx) => {
                    tracing::warn!(version = idx.version, "unknown cache index version; starting empty");
                    BTreeMap::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "corrupt cache index; starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(storage_io("read cache index", &index_path, e)),
        };

        let before = entries.len();
        let mut live = BTreeMap::new();
        for (key, entry) in std::mem::take(&mut entries) {
            if tokio::fs::try_exists(root.join(&entry.file))
                .await
                .unwrap_or(false)
            {
                live.insert(key, entry);
            }
        }
        if live.len() != before {
            tracing::debug!(dropped = before - live.len(), "dropped index entries without payload");
        }
        tracing::debug!(root = %root.display(), entries = live.len(), "opened disk cache");

        Ok(Self {
            root,
            index: Mutex::new(live),
            persist: tokio::sync::Mutex::new(()),
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Directory holding payloads and the index.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        let n = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!("{name}.{}.{n}.tmp", std::process::id()))
    }

    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> RouteReelResult<()> {
        let tmp = self.tmp_path(name);
        let dst = self.root.join(name);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| storage_io("write", &tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &dst).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_io("rename into", &dst, e));
        }
        Ok(())
    }

    async fn persist_index(&self) -> RouteReelResult<()> {
        let _guard = self.persist.lock().await;
        let snapshot = IndexFile {
            version: INDEX_VERSION,
            entries: lock(&self.index)?.clone(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| RouteReelError::serde(format!("encode cache index: {e}")))?;
        self.write_atomic(INDEX_FILE, &bytes).await
    }

    async fn forget(&self, key: &str) -> RouteReelResult<()> {
        lock(&self.index)?.remove(key);
        tracing::debug!(key, "payload file vanished; dropping index entry");
        self.persist_index().await
    }

    async fn remove_payload(&self, file: &str) -> RouteReelResult<()> {
        let path = self.root.join(file);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_io("remove", &path, e)),
        }
    }
}

impl CacheStorage for DiskStorage {
    async fn lookup(&self, key: &str) -> RouteReelResult<Option<EntryMeta>> {
        let Some(entry) = lock(&self.index)?.get(key).cloned() else {
            return Ok(None);
        };
        let path = self.root.join(&entry.file);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(Some(EntryMeta {
                key: key.to_string(),
                stored_at_ms: entry.stored_at_ms,
                size_bytes: entry.size_bytes,
            })),
            Ok(false) => {
                self.forget(key).await?;
                Ok(None)
            }
            Err(e) => Err(storage_io("stat", &path, e)),
        }
    }

    async fn read(&self, key: &str) -> RouteReelResult<Option<Vec<u8>>> {
        let Some(file) = lock(&self.index)?.get(key).map(|e| e.file.clone()) else {
            return Ok(None);
        };
        let path = self.root.join(&file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.forget(key).await?;
                Ok(None)
            }
            Err(e) => Err(storage_io("read", &path, e)),
        }
    }

    async fn put(&self, key: &str, payload: &[u8], stored_at_ms: u64) -> RouteReelResult<EntryMeta> {
        let file = file_name_for(key);
        self.write_atomic(&file, payload).await?;
        let entry = IndexEntry {
            file,
            stored_at_ms,
            size_bytes: payload.len() as u64,
        };
        lock(&self.index)?.insert(key.to_string(), entry);
        self.persist_index().await?;
        Ok(EntryMeta {
            key: key.to_string(),
            stored_at_ms,
            size_bytes: payload.len() as u64,
        })
    }

    async fn delete(&self, key: &str) -> RouteReelResult<bool> {
        let Some(entry) = lock(&self.index)?.remove(key) else {
            return Ok(false);
        };
        self.remove_payload(&entry.file).await?;
        self.persist_index().await?;
        Ok(true)
    }

    async fn entries(&self) -> RouteReelResult<Vec<EntryMeta>> {
        Ok(lock(&self.index)?
            .iter()
            .map(|(key, e)| EntryMeta {
                key: key.clone(),
                stored_at_ms: e.stored_at_ms,
                size_bytes: e.size_bytes,
            })
            .collect())
    }

    async fn clear(&self) -> RouteReelResult<()> {
        let removed = std::mem::take(&mut *lock(&self.index)?);
        for entry in removed.values() {
            self.remove_payload(&entry.file).await?;
        }
        self.persist_index().await
    }

    fn handle_for(&self, key: &str) -> String {
        self.root.join(file_name_for(key)).display().to_string()
    }

    async fn flush(&self) -> RouteReelResult<()> {
        self.persist_index().await
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/storage.rs"]
mod tests;
