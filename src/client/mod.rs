//! Content node client
//!
//! The network client is a capability the retrieval core consumes, not a
//! protocol it implements. [`ContentClient`] is the seam; [`HttpContentClient`]
//! speaks the HTTP RPC surface of an IPFS node (kubo style).

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;

pub use http::HttpContentClient;

/// Result of a remote add
#[derive(Debug, Clone)]
pub struct AddedContent {
    /// Content identifier reported by the node
    pub cid: String,
    /// Whether the node pinned the content as part of the add
    pub pinned: bool,
}

/// Capability interface to a content-addressed network node
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Store content remotely and return its CID (default-pinned)
    async fn add(&self, bytes: Bytes, name: &str) -> Result<AddedContent, FetchError>;

    /// Retrieve content as an order-preserving sequence of chunks
    async fn cat(&self, cid: &str) -> Result<Vec<Bytes>, FetchError>;

    /// Pin a CID so the node retains it
    async fn pin(&self, cid: &str) -> Result<(), FetchError>;

    /// Remove the pin for a CID
    async fn unpin(&self, cid: &str) -> Result<(), FetchError>;
}
