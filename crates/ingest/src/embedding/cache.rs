use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use semchunk_core::{content_hash, Vector};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const ENTRY_EXTENSION: &str = "vec";

/// Content-addressed embedding cache, persisted as one file per text.
///
/// Layout:
/// ```text
/// cache_dir/
///   3a7bd3e2...c1.vec   <- msgpack Vec<f32>, named by SHA-256 of the text
/// ```
///
/// Disk is the source of truth and is never evicted; a bounded LRU keeps hot
/// entries in memory. Entries are written through a temp file and renamed into
/// place, so concurrent writers of the same key never leave a torn file.
pub struct EmbeddingCache {
    root: PathBuf,
    memory: Mutex<LruCache<String, Vector>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, memory_entries: usize) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let capacity = NonZeroUsize::new(memory_entries).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            root,
            memory: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable key for a text: SHA-256 hex of its UTF-8 bytes.
    pub fn key_for(text: &str) -> String {
        content_hash(text)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    fn memory(&self) -> MutexGuard<'_, LruCache<String, Vector>> {
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a cached embedding by text. Unreadable entries count as misses.
    pub fn get(&self, text: &str) -> Option<Vector> {
        let key = Self::key_for(text);
        if let Some(vec) = self.memory().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(vec.clone());
        }

        match self.read_entry(&key) {
            Some(vec) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.memory().put(key, vec.clone());
                Some(vec)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn read_entry(&self, key: &str) -> Option<Vector> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "unreadable cache entry, treating as miss");
                return None;
            }
        };
        match rmp_serde::from_slice::<Vector>(&bytes) {
            Ok(vec) if !vec.is_empty() => Some(vec),
            Ok(_) => {
                warn!(path = %path.display(), "empty cache entry, treating as miss");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    /// Store an embedding for a text. Rewriting a key replaces it atomically.
    pub fn set(&self, text: &str, embedding: &[f32]) -> std::io::Result<()> {
        let key = Self::key_for(text);
        let bytes = rmp_serde::to_vec(embedding)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        let path = self.entry_path(&key);
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(key = %key, dims = embedding.len(), "cached embedding");

        self.memory().put(key, embedding.to_vec());
        Ok(())
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Entries currently held in memory.
    pub fn memory_len(&self) -> usize {
        self.memory().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hit_and_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(tmp.path(), 100).unwrap();

        assert!(cache.get("hello").is_none());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);

        cache.set("hello", &[1.0, 2.0, 3.0]).unwrap();
        let result = cache.get("hello").unwrap();
        assert_eq!(result, vec![1.0, 2.0, 3.0]);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn set_twice_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(tmp.path(), 100).unwrap();
        cache.set("same", &[0.5, 0.25]).unwrap();
        cache.set("same", &[0.5, 0.25]).unwrap();
        assert_eq!(cache.get("same").unwrap(), vec![0.5, 0.25]);

        let files = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(files, 1, "one file per key, no temp leftovers");
    }

    #[test]
    fn concurrent_writers_of_one_key_leave_a_whole_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(tmp.path(), 4).unwrap();
        let vector: Vec<f32> = (0..768).map(|i| i as f32 * 0.5).collect();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        cache.set("shared sentence", &vector).unwrap();
                    }
                });
            }
        });

        let files: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1, "temp files left behind: {files:?}");

        let reopened = EmbeddingCache::open(tmp.path(), 4).unwrap();
        assert_eq!(reopened.get("shared sentence").unwrap(), vector);
    }

    #[test]
    fn persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let cache = EmbeddingCache::open(tmp.path(), 10).unwrap();
            cache.set("persisted sentence", &[0.1, 0.2, 0.3]).unwrap();
        }
        let reopened = EmbeddingCache::open(tmp.path(), 10).unwrap();
        assert_eq!(reopened.memory_len(), 0);
        assert_eq!(reopened.get("persisted sentence").unwrap(), vec![0.1, 0.2, 0.3]);
        assert_eq!(reopened.memory_len(), 1);
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(tmp.path(), 10).unwrap();
        let key = EmbeddingCache::key_for("broken");
        std::fs::write(tmp.path().join(format!("{key}.vec")), b"\xc1\xc1not msgpack").unwrap();

        assert!(cache.get("broken").is_none());
        assert_eq!(cache.misses(), 1);

        cache.set("broken", &[9.0]).unwrap();
        assert_eq!(cache.get("broken").unwrap(), vec![9.0]);
    }

    #[test]
    fn memory_front_is_bounded_but_disk_is_not() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(tmp.path(), 2).unwrap();
        cache.set("a", &[1.0]).unwrap();
        cache.set("b", &[2.0]).unwrap();
        cache.set("c", &[3.0]).unwrap();
        assert_eq!(cache.memory_len(), 2);
        assert_eq!(cache.get("a").unwrap(), vec![1.0]);
    }

    #[test]
    fn hit_rate_calculation() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(tmp.path(), 100).unwrap();
        assert_eq!(cache.hit_rate(), 0.0);

        cache.set("x", &[1.0]).unwrap();
        cache.get("x"); // hit
        cache.get("y"); // miss
        assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn key_is_sha256_hex() {
        let key = EmbeddingCache::key_for("abc");
        assert_eq!(
            key,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
