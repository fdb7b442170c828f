//! Retrieval sources
//!
//! Each fallback layer behind the cache exposes the same one-shot
//! [`ByteSource`] capability, so the service iterates an ordered list of
//! sources instead of nesting failure handling per layer.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::client::ContentClient;
use crate::error::FetchError;

/// A single retrieval attempt against one fallback layer
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    /// Try to produce the full content for a CID
    async fn attempt(&self, cid: &str) -> Result<Bytes, FetchError>;
}

/// Presents a connected node client as a retrieval source
///
/// Chunks are concatenated in receipt order into one buffer; only a
/// complete buffer is ever returned, so a cancelled or failed stream
/// never produces partial content downstream.
pub struct ClientSource {
    client: Arc<dyn ContentClient>,
}

impl ClientSource {
    pub fn new(client: Arc<dyn ContentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ByteSource for ClientSource {
    fn name(&self) -> &'static str {
        "node"
    }

    async fn attempt(&self, cid: &str) -> Result<Bytes, FetchError> {
        let chunks = self.client.cat(cid).await?;

        let total: usize = chunks.iter().map(|c| c.len()).sum();
        let mut buffer = BytesMut::with_capacity(total);
        for chunk in &chunks {
            buffer.extend_from_slice(chunk);
        }

        debug!(cid = cid, chunks = chunks.len(), size = total, "Assembled content from node stream");
        Ok(buffer.freeze())
    }
}
