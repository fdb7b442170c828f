//! In-memory cache tier
//!
//! Fast primary tier for retrieved content, backed by Moka with a
//! byte-weighted capacity so large payloads cannot crowd out the cache.

use bytes::Bytes;
use moka::sync::Cache;
use tracing::trace;

/// Default maximum in-memory cache size: 64 MB
pub const DEFAULT_MEMORY_CAPACITY: u64 = 64 * 1024 * 1024;

/// Byte cache keyed by CID
pub struct MemoryTier {
    cache: Cache<String, Bytes>,
}

impl MemoryTier {
    /// Create a memory tier bounded to `max_capacity` total bytes
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .weigher(|_cid: &String, bytes: &Bytes| bytes.len().try_into().unwrap_or(u32::MAX))
            .name("content_memory_tier")
            .build();

        Self { cache }
    }

    /// Get cached bytes for a CID
    pub fn get(&self, cid: &str) -> Option<Bytes> {
        let hit = self.cache.get(cid);
        trace!(cid = cid, hit = hit.is_some(), "Memory tier lookup");
        hit
    }

    /// Insert bytes for a CID
    pub fn insert(&self, cid: &str, bytes: Bytes) {
        self.cache.insert(cid.to_string(), bytes);
    }

    /// Remove one entry
    pub fn remove(&self, cid: &str) {
        self.cache.invalidate(cid);
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
