//! Shared cache of open archives.
//!
//! Each archive path owns a single-flight slot: the first caller opens the
//! archive while later callers for the same path wait on that slot. Opens of
//! different paths never wait on each other, and the map lock is held only
//! for the slot lookup, never across I/O.
//!
//! Under the default [`KeepForever`] policy a handle lives as long as the
//! cache. Failed opens leave the slot empty so the next call retries.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::zip::ZipArchive;

use super::error::VfsError;

/// Opens the archive an archive path names.
#[async_trait]
pub trait ArchiveOpener: Send + Sync {
    async fn open(&self, path: &str) -> anyhow::Result<ZipArchive>;
}

/// Opens local files, or `http(s)://` URLs through Range requests.
pub struct SourceOpener;

#[async_trait]
impl ArchiveOpener for SourceOpener {
    async fn open(&self, path: &str) -> anyhow::Result<ZipArchive> {
        if is_remote(path) {
            ZipArchive::open_remote(path).await
        } else {
            ZipArchive::open_local(Path::new(path)).await
        }
    }
}

pub fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Decides whether a cached archive must be reopened.
pub trait CachePolicy: Send + Sync {
    fn is_stale(&self, path: &str, archive: &ZipArchive) -> bool;
}

/// Handles are never refreshed.
pub struct KeepForever;

impl CachePolicy for KeepForever {
    fn is_stale(&self, _path: &str, _archive: &ZipArchive) -> bool {
        false
    }
}

/// Reopen a local archive whose modification time changed since it was
/// opened, or which disappeared.
///
/// Remote archives are treated as immutable and never reopened; the check
/// is a local `stat`.
pub struct ModifiedSince;

impl CachePolicy for ModifiedSince {
    fn is_stale(&self, path: &str, archive: &ZipArchive) -> bool {
        if is_remote(path) {
            return false;
        }
        let Some(opened) = archive.modified() else {
            return false;
        };
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(current) => current != opened,
            Err(_) => true,
        }
    }
}

type Slot = Arc<OnceCell<Arc<ZipArchive>>>;

pub struct ArchiveCache {
    opener: Box<dyn ArchiveOpener>,
    policy: Box<dyn CachePolicy>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Default for ArchiveCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveCache {
    pub fn new() -> Self {
        Self::with_opener(SourceOpener)
    }

    pub fn with_opener(opener: impl ArchiveOpener + 'static) -> Self {
        Self {
            opener: Box::new(opener),
            policy: Box::new(KeepForever),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: impl CachePolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Get the open archive for `path`, opening it on first use.
    ///
    /// Concurrent calls for one path share a single open; the returned
    /// handles are the same `Arc`.
    pub async fn open(&self, path: &str) -> Result<Arc<ZipArchive>, VfsError> {
        let slot = self.slot(path);
        if let Some(archive) = slot.get() {
            debug!(path, "using opened archive");
            return Ok(archive.clone());
        }

        slot.get_or_try_init(|| async {
            match self.opener.open(path).await {
                Ok(archive) => {
                    info!(path, entries = archive.len(), "opened archive");
                    Ok(Arc::new(archive))
                }
                Err(source) => {
                    let reason = format!("{source:#}");
                    warn!(path, error = %reason, "cannot open archive");
                    Err(VfsError::ArchiveOpen {
                        path: path.to_string(),
                        source,
                    })
                }
            }
        })
        .await
        .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The slot to use for `path`. The policy runs outside the map lock.
    fn slot(&self, path: &str) -> Slot {
        let current = self.lock().get(path).cloned();
        if let Some(slot) = &current {
            match slot.get() {
                Some(archive) if self.policy.is_stale(path, archive) => {
                    info!(path, "archive changed on disk, reopening");
                }
                _ => return slot.clone(),
            }
        }

        let mut slots = self.lock();
        if let Some(latest) = slots.get(path) {
            // Someone else created or replaced the slot in the meantime
            if !current.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, latest)) {
                return latest.clone();
            }
        }

        let slot = Slot::default();
        slots.insert(path.to_string(), slot.clone());
        slot
    }

    /// Number of archives currently open.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().get(path).is_some_and(|slot| slot.initialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::test_utils::ZipBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Serves fixture archives for paths ending in `.zip` and counts opens.
    struct CountingOpener {
        opens: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl ArchiveOpener for CountingOpener {
        async fn open(&self, path: &str) -> anyhow::Result<ZipArchive> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if !path.ends_with(".zip") {
                anyhow::bail!("no such archive: {path}");
            }
            let data = ZipBuilder::new().stored(path, b"x").finish();
            ZipArchive::open(Arc::new(MemoryReader::new(data))).await
        }
    }

    fn counting(delay: Duration) -> (ArchiveCache, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let cache = ArchiveCache::with_opener(CountingOpener {
            opens: opens.clone(),
            delay,
        });
        (cache, opens)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_opens_share_one_handle() {
        let (cache, opens) = counting(Duration::from_millis(50));
        let cache = Arc::new(cache);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.open("/srv/site.zip").await.unwrap() })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));

        let again = cache.open("/srv/site.zip").await.unwrap();
        assert!(Arc::ptr_eq(&again, &handles[0]));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn distinct_paths_open_concurrently() {
        let (cache, opens) = counting(Duration::from_millis(200));
        let cache = Arc::new(cache);

        let started = std::time::Instant::now();
        let a = tokio::spawn({
            let cache = cache.clone();
            async move { cache.open("/a.zip").await.map(|_| ()) }
        });
        let b = tokio::spawn({
            let cache = cache.clone();
            async move { cache.open("/b.zip").await.map(|_| ()) }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_millis(390));
        assert!(cache.contains("/a.zip") && cache.contains("/b.zip"));
    }

    #[tokio::test]
    async fn failures_are_retried_not_cached() {
        let (cache, opens) = counting(Duration::ZERO);

        for attempt in 1..=3 {
            let Err(err) = cache.open("/missing.tar").await else {
                panic!("opened a path that cannot exist");
            };
            assert!(err.is_not_found());
            assert_eq!(opens.load(Ordering::SeqCst), attempt);
        }
        assert!(cache.is_empty());
        assert!(!cache.contains("/missing.tar"));
    }

    #[tokio::test]
    async fn missing_file_opens_once_it_appears() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.zip");
        let key = path.to_str().unwrap();
        let cache = ArchiveCache::new();

        assert!(matches!(
            cache.open(key).await,
            Err(VfsError::ArchiveOpen { .. })
        ));
        assert!(cache.open(key).await.is_err());

        std::fs::write(&path, ZipBuilder::new().stored("a.txt", b"a").finish()).unwrap();
        let archive = cache.open(key).await.unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn keep_forever_ignores_changes_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.zip");
        let key = path.to_str().unwrap();
        std::fs::write(&path, ZipBuilder::new().stored("a.txt", b"a").finish()).unwrap();

        let cache = ArchiveCache::new();
        let first = cache.open(key).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let second = cache.open(key).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn modified_since_reopens_replaced_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.zip");
        let key = path.to_str().unwrap();
        std::fs::write(&path, ZipBuilder::new().stored("a.txt", b"a").finish()).unwrap();

        let cache = ArchiveCache::new().with_policy(ModifiedSince);
        let first = cache.open(key).await.unwrap();
        let unchanged = cache.open(key).await.unwrap();
        assert!(Arc::ptr_eq(&first, &unchanged));

        let replacement = ZipBuilder::new()
            .stored("a.txt", b"a")
            .stored("b.txt", b"b")
            .finish();
        std::fs::write(&path, replacement).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        let later = first.modified().unwrap() + Duration::from_secs(10);
        file.set_modified(later).unwrap();

        let second = cache.open(key).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
        // the old handle stays usable for whoever still holds it
        assert_eq!(first.len(), 1);
    }

    /// Sleeps while judging one path, holding up whoever waits on it.
    struct SlowFor(&'static str);

    impl CachePolicy for SlowFor {
        fn is_stale(&self, path: &str, _archive: &ZipArchive) -> bool {
            if path == self.0 {
                std::thread::sleep(Duration::from_millis(300));
            }
            false
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn staleness_check_does_not_hold_the_map() {
        let (cache, opens) = counting(Duration::ZERO);
        let cache = Arc::new(cache.with_policy(SlowFor("/slow.zip")));
        cache.open("/slow.zip").await.unwrap();
        cache.open("/fast.zip").await.unwrap();

        let slow = tokio::spawn({
            let cache = cache.clone();
            async move { cache.open("/slow.zip").await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        cache.open("/fast.zip").await.unwrap();
        assert!(cache.contains("/slow.zip"));
        assert!(started.elapsed() < Duration::from_millis(200));

        slow.await.unwrap().unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn modified_since_keeps_remote_archives() {
        let data = ZipBuilder::new().stored("a.txt", b"a").finish();
        let server = crate::test_utils::RangeServer::start(data, true).await;

        let cache = ArchiveCache::new().with_policy(ModifiedSince);
        let first = cache.open(&server.url).await.unwrap();
        let second = cache.open(&server.url).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!ModifiedSince.is_stale(&server.url, &first));
    }

    #[test]
    fn remote_paths() {
        assert!(is_remote("http://example.com/a.zip"));
        assert!(is_remote("https://example.com/a.zip"));
        assert!(!is_remote("/srv/http/a.zip"));
        assert!(!is_remote("httpdocs/a.zip"));
    }
}
