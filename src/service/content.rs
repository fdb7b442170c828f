//! Retrieval service
//!
//! Composes the tiered cache, the node client and the gateway fetcher
//! into one ordered lookup chain, and keeps the file registry updated as
//! a side effect of add/pin/unpin operations. Holds no persistent state
//! of its own.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::cache::TieredCache;
use crate::client::{ContentClient, HttpContentClient};
use crate::error::{Error, FetchError};
use crate::registry::{now_millis, FileRecord, FileRegistry};

use super::events::ChangeEvent;
use super::sources::{ByteSource, ClientSource};

/// Broadcast channel depth for change events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connection lifecycle of the node client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Internal connection slot
enum Connection {
    Disconnected,
    Connecting,
    Connected(Arc<dyn ContentClient>),
}

/// Orchestrates retrieval across cache, node client and gateway
pub struct ContentService {
    /// Node client slot, guarded by the connection lifecycle
    connection: RwLock<Connection>,
    /// Local byte cache (memory + disk tiers)
    cache: TieredCache,
    /// Durable metadata registry
    registry: FileRegistry,
    /// Last-resort retrieval source
    gateway: Box<dyn ByteSource>,
    /// Change event fan-out
    events: broadcast::Sender<ChangeEvent>,
}

impl ContentService {
    /// Create a service over the given stores and gateway
    ///
    /// The service starts disconnected; call [`connect`](Self::connect) or
    /// [`connect_http`](Self::connect_http) before issuing operations.
    pub fn new(cache: TieredCache, registry: FileRegistry, gateway: Box<dyn ByteSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            connection: RwLock::new(Connection::Disconnected),
            cache,
            registry,
            gateway,
            events,
        }
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        match *self.connection.read().await {
            Connection::Disconnected => ConnectionState::Disconnected,
            Connection::Connecting => ConnectionState::Connecting,
            Connection::Connected(_) => ConnectionState::Connected,
        }
    }

    /// Establish the node client by running `dial`
    ///
    /// Transitions Disconnected -> Connecting -> Connected; a dial failure
    /// returns to Disconnected and surfaces as `ConnectFailed`. Not retried
    /// here; retry policy belongs to the caller.
    pub async fn connect<F, Fut>(&self, dial: F) -> Result<(), Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn ContentClient>, FetchError>>,
    {
        *self.connection.write().await = Connection::Connecting;

        match dial().await {
            Ok(client) => {
                *self.connection.write().await = Connection::Connected(client);
                info!("Content service connected");
                Ok(())
            }
            Err(e) => {
                *self.connection.write().await = Connection::Disconnected;
                warn!(error = %e, "Failed to connect content service");
                Err(Error::ConnectFailed(e))
            }
        }
    }

    /// Connect over a node's HTTP RPC API
    pub async fn connect_http(&self, api_base: &str) -> Result<(), Error> {
        let api_base = api_base.to_string();
        self.connect(|| async move {
            let client = HttpContentClient::connect(&api_base).await?;
            Ok(Arc::new(client) as Arc<dyn ContentClient>)
        })
        .await
    }

    /// Drop the node client and return to Disconnected
    pub async fn disconnect(&self) {
        *self.connection.write().await = Connection::Disconnected;
        info!("Content service disconnected");
    }

    /// Get the connected client, or fail before any I/O
    async fn client(&self) -> Result<Arc<dyn ContentClient>, Error> {
        match &*self.connection.read().await {
            Connection::Connected(client) => Ok(client.clone()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Add content to the network and record it
    ///
    /// On success the registry gains a record (pin state as reported by
    /// the node) and the bytes are cached locally. On failure nothing is
    /// written.
    pub async fn add_file(&self, bytes: Bytes, name: &str, mime_type: &str) -> Result<String, Error> {
        let client = self.client().await?;

        let added = client
            .add(bytes.clone(), name)
            .await
            .map_err(Error::AddFailed)?;

        let now = now_millis();
        self.registry.upsert(FileRecord {
            cid: added.cid.clone(),
            name: name.to_string(),
            size: bytes.len() as u64,
            mime_type: mime_type.to_string(),
            date_added: now,
            last_accessed: now,
            is_pinned: added.pinned,
        })?;
        self.cache.put(&added.cid, &bytes);

        let _ = self.events.send(ChangeEvent::FileAdded {
            cid: added.cid.clone(),
        });

        info!(cid = %added.cid, name = name, size = bytes.len(), "File added");
        Ok(added.cid)
    }

    /// Retrieve content for a CID: cache, then node, then gateway
    ///
    /// A cache hit touches the registry and returns with zero network
    /// calls. Misses fall through the sources in order; the first success
    /// is cached and returned. Exhausting every source surfaces
    /// `RetrievalFailed` carrying the last (gateway) error.
    pub async fn fetch_file(&self, cid: &str) -> Result<Bytes, Error> {
        let client = self.client().await?;

        if let Some(bytes) = self.cache.get(cid) {
            self.touch_quietly(cid);
            return Ok(bytes);
        }

        let node = ClientSource::new(client);
        let sources: [&dyn ByteSource; 2] = [&node, self.gateway.as_ref()];

        let mut last_err = FetchError::NotFound(cid.to_string());
        for source in sources {
            match source.attempt(cid).await {
                Ok(bytes) => {
                    self.cache.put(cid, &bytes);
                    self.touch_quietly(cid);
                    debug!(cid = cid, source = source.name(), size = bytes.len(), "Content retrieved");
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(cid = cid, source = source.name(), error = %e, "Retrieval source failed, falling back");
                    last_err = e;
                }
            }
        }

        Err(Error::RetrievalFailed {
            cid: cid.to_string(),
            source: last_err,
        })
    }

    /// Pin a CID on the node
    ///
    /// Returns true on confirmed success; on remote failure returns false
    /// and leaves the registry record untouched.
    pub async fn pin_file(&self, cid: &str) -> Result<bool, Error> {
        let client = self.client().await?;

        match client.pin(cid).await {
            Ok(()) => {
                self.registry.set_pinned(cid, true)?;
                let _ = self.events.send(ChangeEvent::PinChanged {
                    cid: cid.to_string(),
                    pinned: true,
                });
                Ok(true)
            }
            Err(e) => {
                warn!(cid = cid, error = %e, "Pin failed");
                Ok(false)
            }
        }
    }

    /// Remove the pin for a CID on the node
    ///
    /// Same contract as [`pin_file`](Self::pin_file).
    pub async fn unpin_file(&self, cid: &str) -> Result<bool, Error> {
        let client = self.client().await?;

        match client.unpin(cid).await {
            Ok(()) => {
                self.registry.set_pinned(cid, false)?;
                let _ = self.events.send(ChangeEvent::PinChanged {
                    cid: cid.to_string(),
                    pinned: false,
                });
                Ok(true)
            }
            Err(e) => {
                warn!(cid = cid, error = %e, "Unpin failed");
                Ok(false)
            }
        }
    }

    /// Empty the local cache
    ///
    /// The registry is untouched: it reflects known uploads, the cache
    /// reflects locally available bytes.
    pub async fn purge_cache(&self) -> Result<(), Error> {
        self.client().await?;
        self.cache.clear();
        let _ = self.events.send(ChangeEvent::CacheCleared);
        info!("Cache purged");
        Ok(())
    }

    /// All known records in insertion order, no network access
    pub async fn list_files(&self) -> Result<Vec<FileRecord>, Error> {
        self.client().await?;
        Ok(self.registry.list())
    }

    /// Update last-accessed without failing a successful retrieval
    fn touch_quietly(&self, cid: &str) {
        if let Err(e) = self.registry.touch(cid) {
            warn!(cid = cid, error = %e, "Failed to update last-accessed timestamp");
        }
    }
}
