//! Two-tier content cache
//!
//! Composes the memory and disk tiers behind one CID-keyed interface.
//! Lookups consult memory first, then disk; writes route by payload size.
//! Cache failures never surface to callers: an entry that cannot be
//! stored is simply uncached, and a store outage reads as a miss.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::{debug, warn};

use super::disk::{DiskTier, DEFAULT_MAX_DISK_SIZE};
use super::memory::{MemoryTier, DEFAULT_MEMORY_CAPACITY};

/// Payloads above this size bypass the memory tier: 4 MB
pub const DEFAULT_INLINE_LIMIT: u64 = 4 * 1024 * 1024;

/// CID-keyed byte cache with a fast memory tier and a bounded disk tier
pub struct TieredCache {
    memory: MemoryTier,
    disk: DiskTier,
    /// Largest payload the memory tier will accept
    inline_limit: u64,
    /// Cache hit counter (either tier)
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
}

impl TieredCache {
    /// Create a cache with default capacities at the platform cache path
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            memory: MemoryTier::new(DEFAULT_MEMORY_CAPACITY),
            disk: DiskTier::new()?,
            inline_limit: DEFAULT_INLINE_LIMIT,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Create a cache with custom capacities
    ///
    /// # Arguments
    /// * `disk_dir` - Directory for the disk tier
    /// * `max_disk_size` - Disk tier size bound in bytes
    /// * `memory_capacity` - Memory tier size bound in bytes
    /// * `inline_limit` - Largest payload kept in memory
    pub fn with_config(
        disk_dir: PathBuf,
        max_disk_size: u64,
        memory_capacity: u64,
        inline_limit: u64,
    ) -> std::io::Result<Self> {
        Ok(Self {
            memory: MemoryTier::new(memory_capacity),
            disk: DiskTier::with_config(disk_dir, max_disk_size)?,
            inline_limit,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Get cached bytes for a CID, memory tier first
    ///
    /// A disk hit small enough for the memory tier is promoted so the next
    /// lookup is served from memory.
    pub fn get(&self, cid: &str) -> Option<Bytes> {
        if let Some(bytes) = self.memory.get(cid) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cid = cid, "Cache HIT (memory)");
            return Some(bytes);
        }

        if let Some(bytes) = self.disk.get(cid) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cid = cid, "Cache HIT (disk)");
            if bytes.len() as u64 <= self.inline_limit {
                self.memory.insert(cid, bytes.clone());
            }
            return Some(bytes);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cid = cid, "Cache MISS");
        None
    }

    /// Cache bytes for a CID
    ///
    /// Small payloads go to the memory tier, large ones to disk. A disk
    /// write failure leaves the entry uncached rather than failing the
    /// calling operation.
    pub fn put(&self, cid: &str, bytes: &Bytes) {
        if bytes.len() as u64 <= self.inline_limit {
            self.memory.insert(cid, bytes.clone());
            return;
        }

        if let Err(e) = self.disk.store(cid, bytes) {
            warn!(cid = cid, error = %e, "Failed to cache entry, continuing uncached");
        }
    }

    /// Remove one entry from both tiers
    pub fn delete(&self, cid: &str) {
        self.memory.remove(cid);
        self.disk.remove(cid);
    }

    /// Remove all entries from both tiers
    pub fn clear(&self) {
        self.memory.clear();
        self.disk.clear();
    }

    /// Cache statistics: (hits, misses, hit rate %)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }
}
