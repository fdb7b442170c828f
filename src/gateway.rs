//! Public gateway fetcher
//!
//! Last-resort read-only retrieval over a plain HTTP gateway
//! (`{base}/ipfs/{cid}`). Used only when the node client is unavailable
//! or fails. Never retries; retry policy belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::service::ByteSource;

/// Default public gateway
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io";

/// HTTP client timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only HTTP bridge to the content-addressed network
pub struct GatewayFetcher {
    /// HTTP client for making requests
    http_client: Client,
    /// Gateway base URL
    gateway_base: String,
}

impl GatewayFetcher {
    /// Create a fetcher against the default public gateway
    pub fn new() -> Self {
        Self::with_base(DEFAULT_GATEWAY)
    }

    /// Create a fetcher against a custom gateway base URL
    pub fn with_base(gateway_base: &str) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            gateway_base: gateway_base.trim_end_matches('/').to_string(),
        }
    }

    /// Gateway URL for a CID
    pub fn url_for(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_base, cid)
    }

    /// Fetch raw bytes for a CID
    ///
    /// Non-success status maps to `NotFound`, transport failure to
    /// `Unreachable`.
    pub async fn fetch(&self, cid: &str) -> Result<Bytes, FetchError> {
        let url = self.url_for(cid);
        debug!(cid = cid, url = %url, "Fetching from gateway");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(FetchError::NotFound(format!(
                "gateway returned HTTP {} for {}",
                status, cid
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(FetchError::from_transport)?;

        info!(cid = cid, size = bytes.len(), "Fetched content from gateway");
        Ok(bytes)
    }
}

impl Default for GatewayFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteSource for GatewayFetcher {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn attempt(&self, cid: &str) -> Result<Bytes, FetchError> {
        self.fetch(cid).await
    }
}
