//! Content caching layer
//!
//! Two-tier byte cache keyed by CID: a fast in-memory tier (Moka) backed
//! by a size-bounded on-disk tier with LRU eviction.

pub mod disk;
pub mod memory;
pub mod tiered;

pub use disk::DiskTier;
pub use memory::MemoryTier;
pub use tiered::TieredCache;
