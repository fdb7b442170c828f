//! HTTP RPC client for an IPFS node
//!
//! Implements [`ContentClient`] against the node's HTTP API
//! (`/api/v0/...`, kubo style). All RPC endpoints take POST. Add requests
//! upload the payload as a multipart part so the node sees the filename.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{AddedContent, ContentClient};
use crate::error::FetchError;

/// HTTP client timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response from /api/v0/add
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
}

/// Response from /api/v0/version
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionResponse {
    version: String,
}

/// Content node client over the node's HTTP RPC API
pub struct HttpContentClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Node RPC base URL, e.g. "http://127.0.0.1:5001"
    api_base: String,
}

impl HttpContentClient {
    /// Connect to a node, probing its version endpoint
    ///
    /// # Arguments
    /// * `api_base` - Node RPC base URL
    ///
    /// # Returns
    /// A client ready for add/cat/pin calls
    pub async fn connect(api_base: &str) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Protocol(e.to_string()))?;

        let client = Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
        };

        let response = client
            .rpc("version")
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let version: VersionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::Protocol(e.to_string()))?;

        info!(api_base = %client.api_base, version = %version.version, "Connected to content node");
        Ok(client)
    }

    /// Build an RPC request for an endpoint under /api/v0/
    fn rpc(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(format!("{}/api/v0/{}", self.api_base, endpoint))
    }

    /// Check a response status, mapping failures to a fetch error
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(FetchError::from_status(status, &body))
    }
}

#[async_trait]
impl ContentClient for HttpContentClient {
    async fn add(&self, bytes: Bytes, name: &str) -> Result<AddedContent, FetchError> {
        let size = bytes.len();
        let form = Form::new().part(
            "file",
            Part::stream(bytes).file_name(name.to_string()),
        );

        let response = self
            .rpc("add")
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let added: AddResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::Protocol(e.to_string()))?;

        info!(cid = %added.hash, name = name, size = size, "Added content to node");
        Ok(AddedContent {
            cid: added.hash,
            pinned: true,
        })
    }

    async fn cat(&self, cid: &str) -> Result<Vec<Bytes>, FetchError> {
        let response = self
            .rpc("cat")
            .query(&[("arg", cid)])
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let mut response = Self::check(response).await?;

        let mut chunks = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(FetchError::from_transport)?
        {
            chunks.push(chunk);
        }

        debug!(cid = cid, chunks = chunks.len(), "Retrieved content from node");
        Ok(chunks)
    }

    async fn pin(&self, cid: &str) -> Result<(), FetchError> {
        let response = self
            .rpc("pin/add")
            .query(&[("arg", cid)])
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        Self::check(response).await?;
        debug!(cid = cid, "Pinned content on node");
        Ok(())
    }

    async fn unpin(&self, cid: &str) -> Result<(), FetchError> {
        let response = self
            .rpc("pin/rm")
            .query(&[("arg", cid)])
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        Self::check(response).await?;
        debug!(cid = cid, "Unpinned content on node");
        Ok(())
    }
}
