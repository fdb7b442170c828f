//! Error types for the retrieval core
//!
//! Tier-level failures (`FetchError`) are recoverable inside the fallback
//! chain; `Error` is what callers of the service actually see.

use thiserror::Error;

/// Failure of a single retrieval tier or client call
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FetchError {
    /// Map an HTTP status code and response body to a fetch error
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            404 => FetchError::NotFound(body.to_string()),
            _ => FetchError::Protocol(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Map a reqwest transport error
    pub fn from_transport(err: reqwest::Error) -> Self {
        FetchError::Unreachable(err.to_string())
    }
}

/// Errors surfaced by [`ContentService`](crate::service::ContentService)
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted without a connected node client
    #[error("not connected to a content node")]
    NotConnected,

    /// Connecting to the node failed; state returns to disconnected
    #[error("failed to connect to content node: {0}")]
    ConnectFailed(#[source] FetchError),

    /// Remote add did not happen
    #[error("failed to add content: {0}")]
    AddFailed(#[source] FetchError),

    /// Every tier (cache, client, gateway) was exhausted
    #[error("failed to retrieve {cid}: {source}")]
    RetrievalFailed {
        cid: String,
        #[source]
        source: FetchError,
    },

    /// The durable registry store could not be read or written
    #[error("registry store failure: {0}")]
    Persistence(#[from] std::io::Error),
}
