//! End-to-end tests for the retrieval service
//!
//! Uses in-process fakes for the node client and gateway so call counts
//! are observable: cache-hit short-circuits, fallback order and pin
//! semantics are all contracts about which downstream calls happen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use cidcache::cache::tiered::DEFAULT_INLINE_LIMIT;
use cidcache::cache::TieredCache;
use cidcache::{
    AddedContent, ByteSource, ChangeEvent, ConnectionState, ContentClient, ContentService, Error,
    FetchError, FileRegistry,
};

/// Deterministic stand-in CID: a pure function of the bytes, like the real thing
fn fake_cid(bytes: &[u8]) -> String {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("Qm{:016x}", h)
}

#[derive(Default)]
struct FakeClient {
    content: Mutex<HashMap<String, Bytes>>,
    add_calls: AtomicUsize,
    cat_calls: AtomicUsize,
    pin_calls: AtomicUsize,
    unpin_calls: AtomicUsize,
    fail_add: AtomicBool,
    fail_cat: AtomicBool,
    fail_pin: AtomicBool,
    fail_unpin: AtomicBool,
}

#[async_trait]
impl ContentClient for FakeClient {
    async fn add(&self, bytes: Bytes, _name: &str) -> Result<AddedContent, FetchError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable("node down".into()));
        }
        let cid = fake_cid(&bytes);
        self.content.lock().unwrap().insert(cid.clone(), bytes);
        Ok(AddedContent { cid, pinned: true })
    }

    async fn cat(&self, cid: &str) -> Result<Vec<Bytes>, FetchError> {
        self.cat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_cat.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable("node down".into()));
        }
        match self.content.lock().unwrap().get(cid) {
            Some(bytes) => {
                // Deliver in two chunks to exercise stream reassembly
                let mid = bytes.len() / 2;
                Ok(vec![bytes.slice(..mid), bytes.slice(mid..)])
            }
            None => Err(FetchError::NotFound(cid.to_string())),
        }
    }

    async fn pin(&self, _cid: &str) -> Result<(), FetchError> {
        self.pin_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pin.load(Ordering::SeqCst) {
            return Err(FetchError::Protocol("pin rejected".into()));
        }
        Ok(())
    }

    async fn unpin(&self, _cid: &str) -> Result<(), FetchError> {
        self.unpin_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_unpin.load(Ordering::SeqCst) {
            return Err(FetchError::Protocol("unpin rejected".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeGateway {
    content: Mutex<HashMap<String, Bytes>>,
    calls: AtomicUsize,
}

struct GatewaySource(Arc<FakeGateway>);

#[async_trait]
impl ByteSource for GatewaySource {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn attempt(&self, cid: &str) -> Result<Bytes, FetchError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .content
            .lock()
            .unwrap()
            .get(cid)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(cid.to_string()))
    }
}

struct Harness {
    service: ContentService,
    client: Arc<FakeClient>,
    gateway: Arc<FakeGateway>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::with_config(
            dir.path().join("cache"),
            1024 * 1024,
            1024 * 1024,
            DEFAULT_INLINE_LIMIT,
        )
        .unwrap();
        let registry = FileRegistry::open(dir.path().join("registry.json")).unwrap();

        let client = Arc::new(FakeClient::default());
        let gateway = Arc::new(FakeGateway::default());
        let service = ContentService::new(cache, registry, Box::new(GatewaySource(gateway.clone())));

        Self {
            service,
            client,
            gateway,
            _dir: dir,
        }
    }

    async fn connected() -> Self {
        let harness = Self::new();
        let client: Arc<dyn ContentClient> = harness.client.clone();
        harness
            .service
            .connect(move || async move { Ok(client) })
            .await
            .unwrap();
        harness
    }
}

#[tokio::test]
async fn add_creates_record_and_returns_cid() {
    let h = Harness::connected().await;

    let cid = h
        .service
        .add_file(Bytes::from_static(b"hello"), "test.txt", "text/plain")
        .await
        .unwrap();

    let files = h.service.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    let record = &files[0];
    assert_eq!(record.cid, cid);
    assert_eq!(record.name, "test.txt");
    assert_eq!(record.size, 5);
    assert_eq!(record.mime_type, "text/plain");
    assert!(record.is_pinned);
    assert_eq!(record.date_added, record.last_accessed);
}

#[tokio::test]
async fn add_is_deterministic_over_bytes() {
    let h = Harness::connected().await;

    let cid1 = h
        .service
        .add_file(Bytes::from_static(b"same bytes"), "one.txt", "text/plain")
        .await
        .unwrap();
    let cid2 = h
        .service
        .add_file(Bytes::from_static(b"same bytes"), "two.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(cid1, cid2);
    // One registry entry per CID; the re-add replaced it
    let files = h.service.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "two.txt");
}

#[tokio::test]
async fn fetch_round_trips_added_bytes() {
    let h = Harness::connected().await;

    let cid = h
        .service
        .add_file(Bytes::from_static(b"hello"), "test.txt", "text/plain")
        .await
        .unwrap();

    let bytes = h.service.fetch_file(&cid).await.unwrap();
    assert_eq!(bytes, Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn second_fetch_is_a_pure_cache_hit() {
    let h = Harness::connected().await;

    let cid = h
        .service
        .add_file(Bytes::from_static(b"hello"), "test.txt", "text/plain")
        .await
        .unwrap();
    // Empty the cache so the first fetch has to go to the node
    h.service.purge_cache().await.unwrap();

    let first = h.service.fetch_file(&cid).await.unwrap();
    let second = h.service.fetch_file(&cid).await.unwrap();

    assert_eq!(first, Bytes::from_static(b"hello"));
    assert_eq!(second, Bytes::from_static(b"hello"));
    assert_eq!(h.client.cat_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gateway_is_tried_exactly_once_when_node_fails() {
    let h = Harness::connected().await;
    h.client.fail_cat.store(true, Ordering::SeqCst);
    h.gateway
        .content
        .lock()
        .unwrap()
        .insert("QmC2".to_string(), Bytes::from_static(b"world"));

    let bytes = h.service.fetch_file("QmC2").await.unwrap();
    assert_eq!(bytes, Bytes::from_static(b"world"));
    assert_eq!(h.client.cat_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 1);

    // Now cached: no further network calls of any kind
    let again = h.service.fetch_file("QmC2").await.unwrap();
    assert_eq!(again, Bytes::from_static(b"world"));
    assert_eq!(h.client.cat_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausting_all_sources_fails_with_last_error() {
    let h = Harness::connected().await;

    let before = h.service.list_files().await.unwrap();
    let err = h.service.fetch_file("unknown-cid").await.unwrap_err();

    match err {
        Error::RetrievalFailed { cid, source } => {
            assert_eq!(cid, "unknown-cid");
            assert!(matches!(source, FetchError::NotFound(_)));
        }
        other => panic!("expected RetrievalFailed, got {other:?}"),
    }
    assert_eq!(h.service.list_files().await.unwrap(), before);
}

#[tokio::test]
async fn pin_issues_remote_call_every_time() {
    let h = Harness::connected().await;

    let cid = h
        .service
        .add_file(Bytes::from_static(b"pin me"), "pin.txt", "text/plain")
        .await
        .unwrap();

    assert!(h.service.pin_file(&cid).await.unwrap());
    assert!(h.service.pin_file(&cid).await.unwrap());

    assert_eq!(h.client.pin_calls.load(Ordering::SeqCst), 2);
    assert!(h.service.list_files().await.unwrap()[0].is_pinned);
}

#[tokio::test]
async fn unpin_failure_leaves_registry_unchanged() {
    let h = Harness::connected().await;

    let cid = h
        .service
        .add_file(Bytes::from_static(b"hello"), "test.txt", "text/plain")
        .await
        .unwrap();

    assert!(h.service.unpin_file(&cid).await.unwrap());
    assert!(!h.service.list_files().await.unwrap()[0].is_pinned);

    h.client.fail_unpin.store(true, Ordering::SeqCst);
    assert!(!h.service.unpin_file(&cid).await.unwrap());
    assert!(!h.service.list_files().await.unwrap()[0].is_pinned);
}

#[tokio::test]
async fn purge_empties_cache_but_not_registry() {
    let h = Harness::connected().await;

    let cid = h
        .service
        .add_file(Bytes::from_static(b"keep my record"), "a.txt", "text/plain")
        .await
        .unwrap();
    let before = h.service.list_files().await.unwrap();

    h.service.purge_cache().await.unwrap();

    assert_eq!(h.service.list_files().await.unwrap(), before);
    // The bytes are gone locally: the next fetch must go back to the node
    h.service.fetch_file(&cid).await.unwrap();
    assert_eq!(h.client.cat_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn operations_require_a_connection() {
    let h = Harness::new();

    assert!(matches!(
        h.service
            .add_file(Bytes::from_static(b"x"), "x", "text/plain")
            .await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(h.service.fetch_file("QmX").await, Err(Error::NotConnected)));
    assert!(matches!(h.service.pin_file("QmX").await, Err(Error::NotConnected)));
    assert!(matches!(h.service.unpin_file("QmX").await, Err(Error::NotConnected)));
    assert!(matches!(h.service.purge_cache().await, Err(Error::NotConnected)));
    assert!(matches!(h.service.list_files().await, Err(Error::NotConnected)));

    // No I/O happened
    assert_eq!(h.client.add_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.client.cat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connect_failure_returns_to_disconnected() {
    let h = Harness::new();
    assert_eq!(h.service.state().await, ConnectionState::Disconnected);

    let err = h
        .service
        .connect(|| async { Err(FetchError::Unreachable("refused".into())) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConnectFailed(_)));
    assert_eq!(h.service.state().await, ConnectionState::Disconnected);

    let client: Arc<dyn ContentClient> = h.client.clone();
    h.service
        .connect(move || async move { Ok(client) })
        .await
        .unwrap();
    assert_eq!(h.service.state().await, ConnectionState::Connected);

    h.service.disconnect().await;
    assert_eq!(h.service.state().await, ConnectionState::Disconnected);
    assert!(matches!(h.service.list_files().await, Err(Error::NotConnected)));
}

#[tokio::test]
async fn add_failure_writes_nothing() {
    let h = Harness::connected().await;
    h.client.fail_add.store(true, Ordering::SeqCst);

    let err = h
        .service
        .add_file(Bytes::from_static(b"hello"), "test.txt", "text/plain")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AddFailed(_)));
    assert!(h.service.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn change_events_are_broadcast() {
    let h = Harness::connected().await;
    let mut events = h.service.subscribe();

    let cid = h
        .service
        .add_file(Bytes::from_static(b"hello"), "test.txt", "text/plain")
        .await
        .unwrap();
    h.service.unpin_file(&cid).await.unwrap();
    h.service.purge_cache().await.unwrap();

    match events.recv().await.unwrap() {
        ChangeEvent::FileAdded { cid: added } => assert_eq!(added, cid),
        other => panic!("expected FileAdded, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        ChangeEvent::PinChanged { cid: changed, pinned } => {
            assert_eq!(changed, cid);
            assert!(!pinned);
        }
        other => panic!("expected PinChanged, got {other:?}"),
    }
    assert!(matches!(events.recv().await.unwrap(), ChangeEvent::CacheCleared));
}
