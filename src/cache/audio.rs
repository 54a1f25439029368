use log::{ debug, warn };
use md5::{ Digest, Md5 };
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use std::time::{ Duration, SystemTime };
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("audio cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub expired_removed: usize,
    pub evicted: usize,
    pub remaining_bytes: u64,
}

struct CacheEntry {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Content-addressed audio files with an mtime TTL and a byte budget.
pub struct AudioCache {
    dir: PathBuf,
    ttl: Duration,
    max_bytes: u64,
}

impl AudioCache {
    pub async fn new(dir: impl Into<PathBuf>, ttl: Duration, max_bytes: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir, ttl, max_bytes })
    }

    /// MD5 hex over `{text}_{language}_{slow}_{format}`.
    pub fn key(text: &str, language: &str, slow: bool, format: &str) -> String {
        let digest = Md5::digest(format!("{}_{}_{}_{}", text, language, slow, format).as_bytes());
        hex::encode(digest)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn path_for(&self, key: &str, format: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, format))
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        SystemTime::now()
            .duration_since(modified)
            .map(|age| age > self.ttl)
            .unwrap_or(false)
    }

    /// Returns the cached bytes when present and fresh. An expired file is
    /// removed and reported as a miss.
    pub async fn get(&self, key: &str, format: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key, format);
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => {
                return Err(e.into());
            }
        };

        if self.is_expired(meta.modified()?) {
            debug!("Removing expired cache entry {}", path.display());
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e.into());
                }
            }
            return Ok(None);
        }

        Ok(Some(fs::read(&path).await?))
    }

    /// Writes the entry, then sweeps the directory.
    pub async fn put(&self, key: &str, format: &str, bytes: &[u8]) -> Result<SweepStats, CacheError> {
        let path = self.path_for(key, format);
        fs::write(&path, bytes).await?;
        debug!("Cached audio: {}", key);
        self.sweep().await
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Removed by a concurrent sweep after the listing.
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    continue;
                }
                Err(e) => {
                    return Err(e.into());
                }
            };
            if !meta.is_file() {
                continue;
            }
            entries.push(CacheEntry {
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified()?,
            });
        }
        Ok(entries)
    }

    /// Removes expired files, then the oldest files by mtime until the
    /// directory fits in the byte budget.
    pub async fn sweep(&self) -> Result<SweepStats, CacheError> {
        let mut stats = SweepStats::default();
        let mut live = Vec::new();
        for entry in self.entries().await? {
            if self.is_expired(entry.modified) {
                match fs::remove_file(&entry.path).await {
                    Ok(()) => {
                        stats.expired_removed += 1;
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!("Could not remove expired cache file {}: {}", entry.path.display(), e),
                }
            } else {
                live.push(entry);
            }
        }

        self.evict(live, &mut stats).await;
        Ok(stats)
    }

    /// Drops the oldest entries until the rest fit in the byte budget. A file
    /// already gone no longer counts against the budget; any other removal
    /// failure is logged and the pass moves on.
    async fn evict(&self, mut live: Vec<CacheEntry>, stats: &mut SweepStats) {
        let mut total: u64 = live
            .iter()
            .map(|e| e.size)
            .sum();
        if total > self.max_bytes {
            live.sort_by_key(|e| e.modified);
            for entry in &live {
                if total <= self.max_bytes {
                    break;
                }
                match fs::remove_file(&entry.path).await {
                    Ok(()) => {
                        total -= entry.size;
                        stats.evicted += 1;
                        debug!("Evicted cache file {}", entry.path.display());
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        total -= entry.size;
                    }
                    Err(e) => warn!("Could not evict cache file {}: {}", entry.path.display(), e),
                }
            }
        }
        stats.remaining_bytes = total;
    }

    pub async fn size(&self) -> Result<u64, CacheError> {
        Ok(
            self
                .entries().await?
                .iter()
                .map(|e| e.size)
                .sum()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn age(path: &Path, by: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn key_depends_on_every_parameter() {
        let base = AudioCache::key("hello", "en", false, "mp3");
        assert_eq!(base.len(), 32);
        assert_eq!(base, AudioCache::key("hello", "en", false, "mp3"));
        assert_ne!(base, AudioCache::key("hello", "en", true, "mp3"));
        assert_ne!(base, AudioCache::key("hello", "es", false, "mp3"));
        assert_ne!(base, AudioCache::key("hello", "en", false, "wav"));
    }

    #[tokio::test]
    async fn fresh_entry_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path(), Duration::from_secs(3600), 1024).await.unwrap();
        cache.put("abc", "mp3", b"audio").await.unwrap();
        assert_eq!(cache.get("abc", "mp3").await.unwrap().as_deref(), Some(&b"audio"[..]));
        assert_eq!(cache.get("missing", "mp3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_is_removed_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path(), Duration::from_secs(3600), 1024).await.unwrap();
        cache.put("old", "mp3", b"stale").await.unwrap();
        age(&cache.path_for("old", "mp3"), Duration::from_secs(7200));

        assert_eq!(cache.get("old", "mp3").await.unwrap(), None);
        assert!(!cache.path_for("old", "mp3").exists());
    }

    #[tokio::test]
    async fn sweep_purges_expired_then_oldest_over_budget() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path(), Duration::from_secs(3600), 10).await.unwrap();

        std::fs::write(cache.path_for("expired", "mp3"), b"xx").unwrap();
        age(&cache.path_for("expired", "mp3"), Duration::from_secs(4000));
        std::fs::write(cache.path_for("oldest", "mp3"), b"123456").unwrap();
        age(&cache.path_for("oldest", "mp3"), Duration::from_secs(600));
        std::fs::write(cache.path_for("middle", "mp3"), b"123456").unwrap();
        age(&cache.path_for("middle", "mp3"), Duration::from_secs(300));

        let stats = cache.put("newest", "mp3", b"1234").await.unwrap();
        assert_eq!(stats.expired_removed, 1);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.remaining_bytes, 10);
        assert!(!cache.path_for("oldest", "mp3").exists());
        assert!(cache.path_for("middle", "mp3").exists());
        assert!(cache.path_for("newest", "mp3").exists());
    }

    #[tokio::test]
    async fn eviction_skips_files_removed_by_another_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path(), Duration::from_secs(3600), 4).await.unwrap();
        std::fs::write(cache.path_for("kept", "mp3"), b"1234").unwrap();
        std::fs::write(cache.path_for("second", "mp3"), b"123456").unwrap();

        let now = SystemTime::now();
        let live = vec![
            CacheEntry {
                path: cache.path_for("gone", "mp3"),
                size: 6,
                modified: now - Duration::from_secs(60),
            },
            CacheEntry {
                path: cache.path_for("second", "mp3"),
                size: 6,
                modified: now - Duration::from_secs(30),
            },
            CacheEntry {
                path: cache.path_for("kept", "mp3"),
                size: 4,
                modified: now,
            }
        ];

        let mut stats = SweepStats::default();
        cache.evict(live, &mut stats).await;
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.remaining_bytes, 4);
        assert!(!cache.path_for("second", "mp3").exists());
        assert!(cache.path_for("kept", "mp3").exists());
    }
}
