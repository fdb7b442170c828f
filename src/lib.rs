//! cidcache - client-side retrieval and caching for content-addressed storage
//!
//! Sits between an application and a content-addressed (IPFS-style)
//! network. For any CID it decides where to look for bytes (local cache,
//! node client, public gateway), keeps a durable registry of known
//! content, and manages pin state. The network protocol itself is a
//! consumed capability, not implemented here.

pub mod cache;
pub mod client;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod service;

pub use cache::TieredCache;
pub use client::{AddedContent, ContentClient, HttpContentClient};
pub use error::{Error, FetchError};
pub use gateway::GatewayFetcher;
pub use registry::{FileRecord, FileRegistry};
pub use service::{ByteSource, ChangeEvent, ConnectionState, ContentService};
