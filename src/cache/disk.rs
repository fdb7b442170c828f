//! On-disk cache tier
//!
//! Size-bounded secondary store for content that is too large for the
//! memory tier. Uses LRU eviction when the tier exceeds its configured
//! maximum size. Content at a CID never changes, so entries left over
//! from a previous run stay valid and are readable immediately.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, info, warn};

/// Default maximum disk tier size: 1 GB
pub const DEFAULT_MAX_DISK_SIZE: u64 = 1024 * 1024 * 1024;

/// Tracks a stored entry for LRU eviction
#[derive(Debug, Clone)]
struct DiskEntry {
    /// Size of the stored file in bytes
    size: u64,
    /// Last access time (updated on each read)
    last_accessed: SystemTime,
}

/// Disk-backed byte store keyed by CID
pub struct DiskTier {
    /// Root directory for stored content
    dir: PathBuf,
    /// Maximum total size in bytes
    max_size: u64,
    /// Track stored entries for LRU eviction
    entries: Mutex<HashMap<String, DiskEntry>>,
}

impl DiskTier {
    /// Create a disk tier at the default platform cache path
    pub fn new() -> std::io::Result<Self> {
        let dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("cidcache")
            .join("objects");

        Self::with_config(dir, DEFAULT_MAX_DISK_SIZE)
    }

    /// Create a disk tier with custom directory and size bound
    pub fn with_config(dir: PathBuf, max_size: u64) -> std::io::Result<Self> {
        fs::create_dir_all(&dir)?;

        let tier = Self {
            dir,
            max_size,
            entries: Mutex::new(HashMap::new()),
        };

        // Clean up any stale temp files from previous runs
        tier.cleanup();

        info!(
            dir = %tier.dir.display(),
            max_size_mb = max_size / (1024 * 1024),
            "Disk cache tier initialized"
        );
        Ok(tier)
    }

    /// Get cached bytes for a CID
    ///
    /// Entries written by a previous process are picked up here and start
    /// being tracked for eviction.
    pub fn get(&self, cid: &str) -> Option<Bytes> {
        let path = self.local_path(cid);

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(cid = cid, error = %e, "Failed to read disk tier entry");
                return None;
            }
        };

        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            cid.to_string(),
            DiskEntry {
                size: data.len() as u64,
                last_accessed: SystemTime::now(),
            },
        );

        debug!(cid = cid, size = data.len(), "Disk tier HIT");
        Some(Bytes::from(data))
    }

    /// Store bytes for a CID, evicting LRU entries if over the size bound
    pub fn store(&self, cid: &str, data: &[u8]) -> std::io::Result<()> {
        let path = self.local_path(cid);

        // Write atomically so a crash never leaves a partial entry
        let parent = path.parent().unwrap_or(Path::new("/tmp"));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        {
            let mut entries = self.entries.lock().unwrap();
            entries.insert(
                cid.to_string(),
                DiskEntry {
                    size: data.len() as u64,
                    last_accessed: SystemTime::now(),
                },
            );
        }

        debug!(cid = cid, size = data.len(), "Stored entry in disk tier");
        self.evict_if_needed();
        Ok(())
    }

    /// Remove one entry
    pub fn remove(&self, cid: &str) {
        let path = self.local_path(cid);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(cid = cid, error = %e, "Failed to remove disk tier entry");
            }
        }
        self.entries.lock().unwrap().remove(cid);
    }

    /// Remove all entries
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();

        let mut removed = 0u64;
        if let Ok(read_dir) = fs::read_dir(&self.dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_file() {
                    if let Err(e) = fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "Failed to remove cached file");
                    } else {
                        removed += 1;
                    }
                }
            }
        }
        info!(removed = removed, "Disk cache tier cleared");
    }

    /// Evict least recently used entries until back under the size bound
    fn evict_if_needed(&self) {
        let mut entries = self.entries.lock().unwrap();

        let total_size: u64 = entries.values().map(|e| e.size).sum();
        if total_size <= self.max_size {
            return;
        }

        info!(
            total_mb = total_size / (1024 * 1024),
            max_mb = self.max_size / (1024 * 1024),
            "Disk tier exceeds max size, evicting LRU entries"
        );

        // Oldest first
        let mut sorted: Vec<(String, DiskEntry)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        sorted.sort_by(|a, b| a.1.last_accessed.cmp(&b.1.last_accessed));

        let mut freed: u64 = 0;
        let target = total_size - self.max_size;

        for (cid, entry) in sorted {
            if freed >= target {
                break;
            }
            let path = self.local_path(&cid);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to evict cached entry");
            } else {
                debug!(cid = %cid, size = entry.size, "Evicted cached entry");
                freed += entry.size;
                entries.remove(&cid);
            }
        }
    }

    /// Remove stale temp files left by interrupted writes
    ///
    /// Temp files are named ".tmpXXXXXX"; the leading dot means they have
    /// no extension, so they are matched by filename prefix.
    fn cleanup(&self) {
        if let Ok(read_dir) = fs::read_dir(&self.dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                let is_stale_temp = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(".tmp"));
                if is_stale_temp {
                    debug!(path = %path.display(), "Removing stale temp file");
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    /// Local path for a CID (CIDs are filesystem-safe identifiers)
    fn local_path(&self, cid: &str) -> PathBuf {
        self.dir.join(cid)
    }
}
