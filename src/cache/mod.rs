//! Metadata cache: a keyed memory+disk store with single-flight
//! de-duplication and TTL, per spec §4.1.
//!
//! Grounded in the teacher's `utils_ext::performance::DownloadCache`
//! (`Arc<Mutex<HashMap<...>>>` plus a `CacheEntry` with TTL), generalized
//! from a single download cache into the general-purpose metadata cache the
//! spec requires: single-flight joins for concurrent loaders, a disk tier
//! that degrades to memory-only on I/O failure, and `invalidate(prefix)`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, Mutex};

use crate::models::cache_entry::CacheEntry;

/// One slot per key: either a value already resolved, or a broadcast
/// channel that in-flight joiners subscribe to (the single-flight record).
enum Slot {
    Ready(Arc<Vec<u8>>),
    Loading(broadcast::Sender<Arc<Vec<u8>>>),
}

pub struct MetadataCache {
    memory: Mutex<HashMap<String, (Slot, Option<u64>, u64)>>,
    disk_dir: Option<PathBuf>,
}

impl MetadataCache {
    pub fn new(disk_dir: Option<PathBuf>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            disk_dir,
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// `get(key, loader)`: returns a fresh memory entry directly; joins an
    /// in-flight loader for the same key if one is already running (no
    /// duplicate registry call is ever issued for a concurrently requested
    /// key); promotes a fresh disk entry to memory; otherwise invokes
    /// `loader`, stores the result in memory, writes it to disk
    /// asynchronously, and returns it to every joined caller.
    pub async fn get<F, Fut, E>(&self, key: &str, ttl_ms: Option<u64>, loader: F) -> Result<Arc<Vec<u8>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<u8>, E>>,
    {
        // Fast path + single-flight join, scoped so the lock is released
        // before we ever await the loader.
        let join_rx = {
            let mut guard = self.memory.lock().await;
            if let Some((slot, ttl, fetched_at)) = guard.get(key) {
                let expired = ttl.map(|t| Self::now_ms().saturating_sub(*fetched_at) > t).unwrap_or(false);
                match slot {
                    Slot::Ready(value) if !expired => return Ok(value.clone()),
                    Slot::Loading(sender) => Some(sender.subscribe()),
                    _ => None,
                }
            } else {
                None
            }
        };

        if let Some(mut rx) = join_rx {
            if let Ok(value) = rx.recv().await {
                return Ok(value);
            }
            // The original loader's sender dropped without a value (it
            // errored) — fall through and race to become the new loader.
        }

        // Try promoting a fresh disk entry before becoming the loader.
        if let Some(bytes) = self.read_disk_if_fresh(key).await {
            let mut guard = self.memory.lock().await;
            let value = Arc::new(bytes);
            guard.insert(key.to_string(), (Slot::Ready(value.clone()), ttl_ms, Self::now_ms()));
            return Ok(value);
        }

        // Register as the loader for this key.
        let (tx, _rx) = broadcast::channel(1);
        {
            let mut guard = self.memory.lock().await;
            guard.insert(key.to_string(), (Slot::Loading(tx.clone()), ttl_ms, Self::now_ms()));
        }

        let result = loader().await;
        match result {
            Ok(bytes) => {
                let value = Arc::new(bytes);
                {
                    let mut guard = self.memory.lock().await;
                    guard.insert(key.to_string(), (Slot::Ready(value.clone()), ttl_ms, Self::now_ms()));
                }
                let _ = tx.send(value.clone());
                self.write_disk(key, &value, ttl_ms).await;
                Ok(value)
            }
            Err(err) => {
                let mut guard = self.memory.lock().await;
                guard.remove(key);
                Err(err)
            }
        }
    }

    /// Bypasses every cache tier, per spec §4.1 `forceRefresh`.
    pub async fn force_refresh<F, Fut, E>(&self, key: &str, ttl_ms: Option<u64>, loader: F) -> Result<Arc<Vec<u8>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<u8>, E>>,
    {
        {
            let mut guard = self.memory.lock().await;
            guard.remove(key);
        }
        self.get(key, ttl_ms, loader).await
    }

    /// Synchronously removes every entry whose key starts with `prefix`.
    pub async fn invalidate(&self, prefix: &str) {
        let mut guard = self.memory.lock().await;
        guard.retain(|key, _| !key.starts_with(prefix));
    }

    pub async fn clear(&self) {
        let mut guard = self.memory.lock().await;
        guard.clear();
    }

    /// Reads the disk tier's `.meta` sidecar and honors *its own* persisted
    /// `ttl_ms` (written by [`Self::write_disk`]) rather than whatever TTL
    /// the current caller happens to pass — a disk entry written under one
    /// TTL must not be treated as fresher just because a later call asks
    /// with `ttl_ms: None`, per spec §4.1's per-tier TTL requirement.
    async fn read_disk_if_fresh(&self, key: &str) -> Option<Vec<u8>> {
        let dir = self.disk_dir.as_ref()?;
        let (data_path, meta_path) = Self::paths_for(dir, key);
        let meta_bytes = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(?err, key, "disk cache metadata miss");
                return None;
            }
        };
        let entry: CacheEntry = serde_json::from_slice(&meta_bytes).ok()?;
        if entry.is_expired(Self::now_ms()) {
            return None;
        }
        match tokio::fs::read(&data_path).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(?err, key, "disk cache degraded to memory-only");
                None
            }
        }
    }

    async fn write_disk(&self, key: &str, value: &Arc<Vec<u8>>, ttl_ms: Option<u64>) {
        let Some(dir) = self.disk_dir.as_ref() else { return };
        let (data_path, meta_path) = Self::paths_for(dir, key);
        let parent = data_path.parent().map(Path::to_path_buf);
        let write_result: std::io::Result<()> = async {
            if let Some(parent) = parent {
                tokio::fs::create_dir_all(&parent).await?;
            }
            tokio::fs::write(&data_path, value.as_slice()).await?;
            let meta = CacheEntry::new(key, Vec::new(), Self::now_ms(), ttl_ms);
            let meta_bytes = serde_json::to_vec(&meta).unwrap_or_default();
            tokio::fs::write(&meta_path, meta_bytes).await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            // Cache operations never throw for cache-layer failures (§4.1);
            // a disk error degrades to memory-only and is logged.
            tracing::warn!(?err, key, "failed to persist metadata cache entry to disk");
        }
    }

    fn paths_for(dir: &Path, key: &str) -> (PathBuf, PathBuf) {
        let safe_key = crate::util::fs::sanitize_filename(key);
        (dir.join(format!("{safe_key}.json")), dir.join(format!("{safe_key}.meta")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn single_flight_runs_the_loader_exactly_once() {
        let cache = Arc::new(MetadataCache::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get("pypi:requests", None, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<_, std::io::Error>(b"payload".to_vec())
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for value in &results {
            assert_eq!(value.as_slice(), b"payload");
        }
    }

    #[tokio::test]
    async fn invalidate_removes_matching_prefix_only() {
        let cache = MetadataCache::new(None);
        cache.get("pypi:requests", None, || async { Ok::<_, std::io::Error>(b"a".to_vec()) }).await.unwrap();
        cache.get("npm:lodash", None, || async { Ok::<_, std::io::Error>(b"b".to_vec()) }).await.unwrap();

        cache.invalidate("pypi:").await;

        let guard = cache.memory.lock().await;
        assert!(!guard.contains_key("pypi:requests"));
        assert!(guard.contains_key("npm:lodash"));
    }

    #[tokio::test]
    async fn a_disk_entry_written_with_a_short_ttl_is_not_served_stale_from_a_fresh_cache() {
        let dir = tempfile::tempdir().unwrap();
        let key = "pypi:requests";

        // First cache instance populates the disk tier with a 1ms TTL.
        let writer = MetadataCache::new(Some(dir.path().to_path_buf()));
        writer.get(key, Some(1), || async { Ok::<_, std::io::Error>(b"stale".to_vec()) }).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // A second, memory-empty instance must fall through the expired disk
        // entry to the loader instead of serving the stale bytes — this
        // only happens if the TTL written to the `.meta` sidecar was the
        // real one, not a hardcoded `None` that never expires.
        let reader = MetadataCache::new(Some(dir.path().to_path_buf()));
        let value = reader.get(key, Some(1), || async { Ok::<_, std::io::Error>(b"fresh".to_vec()) }).await.unwrap();
        assert_eq!(value.as_slice(), b"fresh");
    }

    #[tokio::test]
    async fn a_disk_entry_within_its_ttl_is_served_without_re_invoking_the_loader() {
        let dir = tempfile::tempdir().unwrap();
        let key = "pypi:requests";

        let writer = MetadataCache::new(Some(dir.path().to_path_buf()));
        writer
            .get(key, Some(crate::models::cache_entry::LISTING_TTL_MS), || async { Ok::<_, std::io::Error>(b"cached".to_vec()) })
            .await
            .unwrap();

        let reader = MetadataCache::new(Some(dir.path().to_path_buf()));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let value = reader
            .get(key, Some(crate::models::cache_entry::LISTING_TTL_MS), || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(b"should-not-be-used".to_vec())
            })
            .await
            .unwrap();

        assert_eq!(value.as_slice(), b"cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
