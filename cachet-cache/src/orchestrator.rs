//! Cache-policy request orchestration.
//!
//! [`RequestOrchestrator`] composes a remote-fetch operation with a
//! [`CacheStore`] and a [`CachePolicy`] to produce one finite result
//! channel per logical request:
//!
//! - `IgnoringCache`: fetch, write through, emit. No cache fallback.
//! - `CacheDontLoad`: cache hit or an explicit miss failure. No network.
//! - `CacheElseLoad`: unexpired hit short-circuits, otherwise as
//!   `IgnoringCache`.
//! - `CacheAndLoad`: hit emitted first (if any), then the network result;
//!   a network failure after a hit is logged, not surfaced.
//!
//! The cache lookup always resolves before the fetch starts, so the
//! cache-then-network ordering is strict rather than raced. Duplicate-looking
//! values are re-emitted as-is; callers handle idempotency.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use cachet_core::{CacheConfig, CachePolicy, FetchError, PayloadEncoding, RequestError, Timestamp};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::connectivity::{AlwaysOnline, ConnectivityProbe};
use crate::key::CacheKey;
use crate::store::{CacheStore, Cacheable};

/// Where a delivered value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Served from the local cache.
    Cache,
    /// Served from the remote fetch.
    Remote,
}

/// One successful emission on a request channel, carrying origin metadata.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    value: T,
    origin: Origin,
    cached_at: Timestamp,
}

impl<T> Delivery<T> {
    fn from_cache(value: T, cached_at: Timestamp) -> Self {
        Self {
            value,
            origin: Origin::Cache,
            cached_at,
        }
    }

    fn from_remote(value: T) -> Self {
        Self {
            value,
            origin: Origin::Remote,
            cached_at: Utc::now(),
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Where this value came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// When the value was written to the cache (cache deliveries) or
    /// received (remote deliveries).
    pub fn cached_at(&self) -> Timestamp {
        self.cached_at
    }
}

/// Item type flowing on a request channel.
pub type RequestItem<T> = Result<Delivery<T>, RequestError>;

/// Finite asynchronous result channel for one orchestrated request.
///
/// Emits at most two successes (cache then network) or one failure, then
/// completes. Dropping the stream aborts the in-flight orchestration task;
/// a fetch already in progress is cancelled at the next await point and its
/// result discarded.
pub struct RequestStream<T> {
    rx: mpsc::Receiver<RequestItem<T>>,
    task: JoinHandle<()>,
}

impl<T> RequestStream<T> {
    /// Wait for the next emission, or `None` once the channel completes.
    pub async fn next_item(&mut self) -> Option<RequestItem<T>> {
        self.rx.recv().await
    }

    /// Drain the channel to completion, collecting every emission in order.
    pub async fn collect_all(mut self) -> Vec<RequestItem<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.rx.recv().await {
            items.push(item);
        }
        items
    }
}

impl<T> Stream for RequestStream<T> {
    type Item = RequestItem<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for RequestStream<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Composes remote fetches with a cache store under a per-request policy.
///
/// The orchestrator is a cheap handle: clones share the same store and
/// connectivity probe. It is constructed once at the composition root and
/// passed to callers - never reached through a static accessor - so tests
/// can substitute in-memory stores and scripted probes.
pub struct RequestOrchestrator<S: CacheStore + 'static> {
    store: Arc<S>,
    connectivity: Arc<dyn ConnectivityProbe>,
    config: CacheConfig,
}

impl<S: CacheStore + 'static> Clone for RequestOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            connectivity: Arc::clone(&self.connectivity),
            config: self.config.clone(),
        }
    }
}

impl<S: CacheStore + 'static> RequestOrchestrator<S> {
    /// Create an orchestrator over the given store, assuming connectivity.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_connectivity(store, Arc::new(AlwaysOnline))
    }

    /// Create an orchestrator with an explicit connectivity probe.
    pub fn with_connectivity(store: Arc<S>, connectivity: Arc<dyn ConnectivityProbe>) -> Self {
        Self {
            store,
            connectivity,
            config: CacheConfig::default(),
        }
    }

    /// Override the cache configuration (default TTL in particular).
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Access the underlying cache store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Issue a request under `policy`.
    ///
    /// `fetch` is the remote operation; it is invoked at most once, and only
    /// after any cache lookup has resolved. Successful remote results are
    /// written through to the cache under `key` with `ttl_minutes` (or the
    /// configured default) before being emitted.
    ///
    /// No timeout is imposed here: a hung fetch hangs the channel until the
    /// caller abandons it or wraps it in an external timeout.
    pub fn request<T, F, Fut>(
        &self,
        key: CacheKey,
        policy: CachePolicy,
        ttl_minutes: Option<i64>,
        encoding: PayloadEncoding,
        fetch: F,
    ) -> RequestStream<T>
    where
        T: Cacheable,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        // Capacity 2: the channel never carries more than two emissions.
        let (tx, rx) = mpsc::channel(2);
        let store = Arc::clone(&self.store);
        let effective = policy.effective(self.connectivity.is_online());
        if effective != policy {
            debug!(key = %key, requested = ?policy, "Offline: downgrading policy to CacheDontLoad");
        }

        let task = tokio::spawn(run_policy(
            store, key, effective, ttl_minutes, encoding, fetch, tx,
        ));
        RequestStream { rx, task }
    }
}

/// Evaluate one policy against the store and fetch, emitting on `tx`.
///
/// Sends are best-effort: if the caller abandoned the stream the channel is
/// closed, and the task simply stops emitting.
async fn run_policy<S, T, F, Fut>(
    store: Arc<S>,
    key: CacheKey,
    policy: CachePolicy,
    ttl_minutes: Option<i64>,
    encoding: PayloadEncoding,
    fetch: F,
    tx: mpsc::Sender<RequestItem<T>>,
) where
    S: CacheStore,
    T: Cacheable,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, FetchError>> + Send,
{
    match policy {
        CachePolicy::CacheDontLoad => {
            let item = match store.retrieve::<T>(&key).await {
                Some((value, cached_at)) => Ok(Delivery::from_cache(value, cached_at)),
                None => Err(RequestError::CacheMiss {
                    key: key.as_str().to_string(),
                }),
            };
            let _ = tx.send(item).await;
        }
        CachePolicy::IgnoringCache => {
            fetch_store_emit(&*store, &key, ttl_minutes, encoding, fetch, &tx).await;
        }
        CachePolicy::CacheElseLoad => {
            if let Some((value, cached_at)) = store.retrieve::<T>(&key).await {
                let _ = tx.send(Ok(Delivery::from_cache(value, cached_at))).await;
                return;
            }
            fetch_store_emit(&*store, &key, ttl_minutes, encoding, fetch, &tx).await;
        }
        CachePolicy::CacheAndLoad => {
            // The cache lookup resolves before the fetch starts; ordering is
            // sequential, never raced.
            let had_hit = match store.retrieve::<T>(&key).await {
                Some((value, cached_at)) => {
                    let _ = tx.send(Ok(Delivery::from_cache(value, cached_at))).await;
                    true
                }
                None => false,
            };

            match fetch().await {
                Ok(value) => {
                    store.store(&value, &key, ttl_minutes, encoding).await;
                    let _ = tx.send(Ok(Delivery::from_remote(value))).await;
                }
                Err(e) => {
                    if had_hit {
                        // The cache hit already satisfied the caller; don't
                        // destabilize a screen that has data.
                        warn!(key = %key, error = %e, "Suppressing refresh failure after cache hit");
                    } else {
                        let _ = tx.send(Err(RequestError::Fetch(e))).await;
                    }
                }
            }
        }
    }
}

/// Shared tail for the policies that end in an unconditional fetch.
async fn fetch_store_emit<S, T, F, Fut>(
    store: &S,
    key: &CacheKey,
    ttl_minutes: Option<i64>,
    encoding: PayloadEncoding,
    fetch: F,
    tx: &mpsc::Sender<RequestItem<T>>,
) where
    S: CacheStore + ?Sized,
    T: Cacheable,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, FetchError>> + Send,
{
    match fetch().await {
        Ok(value) => {
            store.store(&value, key, ttl_minutes, encoding).await;
            let _ = tx.send(Ok(Delivery::from_remote(value))).await;
        }
        Err(e) => {
            let _ = tx.send(Err(RequestError::Fetch(e))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCacheStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Offline;

    impl ConnectivityProbe for Offline {
        fn is_online(&self) -> bool {
            false
        }
    }

    fn orchestrator() -> RequestOrchestrator<MemoryCacheStore> {
        RequestOrchestrator::new(Arc::new(MemoryCacheStore::new()))
    }

    fn counting_fetch(
        counter: Arc<AtomicUsize>,
        result: Result<String, FetchError>,
    ) -> impl FnOnce() -> std::future::Ready<Result<String, FetchError>> + Send + 'static {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(result)
        }
    }

    #[tokio::test]
    async fn test_cache_else_load_empty_cache_fetches_and_writes_through() {
        let orch = orchestrator();
        let key = CacheKey::simple("feed");
        let calls = Arc::new(AtomicUsize::new(0));

        let stream = orch.request(
            key.clone(),
            CachePolicy::CacheElseLoad,
            Some(60),
            PayloadEncoding::Plain,
            counting_fetch(Arc::clone(&calls), Ok("X".to_string())),
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 1);
        let delivery = items.into_iter().next().unwrap().expect("success");
        assert_eq!(delivery.value(), "X");
        assert_eq!(delivery.origin(), Origin::Remote);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let cached = orch.store().retrieve::<String>(&key).await.expect("cached");
        assert_eq!(cached.0, "X");
    }

    #[tokio::test]
    async fn test_cache_else_load_hit_never_touches_network() {
        let orch = orchestrator();
        let key = CacheKey::simple("feed");
        orch.store()
            .store(&"Y".to_string(), &key, Some(60), PayloadEncoding::Plain)
            .await;
        let calls = Arc::new(AtomicUsize::new(0));

        let stream = orch.request(
            key,
            CachePolicy::CacheElseLoad,
            Some(60),
            PayloadEncoding::Plain,
            counting_fetch(Arc::clone(&calls), Ok("Z".to_string())),
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 1);
        let delivery = items.into_iter().next().unwrap().expect("success");
        assert_eq!(delivery.value(), "Y");
        assert_eq!(delivery.origin(), Origin::Cache);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_and_load_emits_cache_then_network() {
        let orch = orchestrator();
        let key = CacheKey::simple("feed");
        orch.store()
            .store(&"Y".to_string(), &key, Some(60), PayloadEncoding::Plain)
            .await;

        let stream = orch.request(
            key.clone(),
            CachePolicy::CacheAndLoad,
            Some(60),
            PayloadEncoding::Plain,
            || std::future::ready(Ok("Z".to_string())),
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().expect("first success");
        let second = items[1].as_ref().expect("second success");
        assert_eq!((first.value().as_str(), first.origin()), ("Y", Origin::Cache));
        assert_eq!(
            (second.value().as_str(), second.origin()),
            ("Z", Origin::Remote)
        );

        let cached = orch.store().retrieve::<String>(&key).await.expect("cached");
        assert_eq!(cached.0, "Z");
    }

    #[tokio::test]
    async fn test_cache_dont_load_empty_cache_is_one_miss_failure() {
        let orch = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));

        let stream = orch.request(
            CacheKey::simple("feed"),
            CachePolicy::CacheDontLoad,
            None,
            PayloadEncoding::Plain,
            counting_fetch(Arc::clone(&calls), Ok("X".to_string())),
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(RequestError::CacheMiss { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_downgrades_ignoring_cache() {
        let store = Arc::new(MemoryCacheStore::new());
        let orch = RequestOrchestrator::with_connectivity(store, Arc::new(Offline));
        let calls = Arc::new(AtomicUsize::new(0));

        let stream = orch.request(
            CacheKey::simple("feed"),
            CachePolicy::IgnoringCache,
            None,
            PayloadEncoding::Plain,
            counting_fetch(Arc::clone(&calls), Ok("X".to_string())),
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(RequestError::CacheMiss { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no remote call attempted");
    }

    #[tokio::test]
    async fn test_expired_entry_counts_as_miss_for_cache_else_load() {
        let orch = orchestrator();
        let key = CacheKey::simple("feed");
        orch.store()
            .store(&"stale".to_string(), &key, Some(0), PayloadEncoding::Plain)
            .await;
        let calls = Arc::new(AtomicUsize::new(0));

        let stream = orch.request(
            key,
            CachePolicy::CacheElseLoad,
            Some(60),
            PayloadEncoding::Plain,
            counting_fetch(Arc::clone(&calls), Ok("fresh".to_string())),
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().expect("success").value(), "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "remote fetch is invoked");
    }

    #[tokio::test]
    async fn test_ignoring_cache_failure_has_no_cache_fallback() {
        let orch = orchestrator();
        let key = CacheKey::simple("feed");
        orch.store()
            .store(&"cached".to_string(), &key, Some(60), PayloadEncoding::Plain)
            .await;

        let stream = orch.request(
            key,
            CachePolicy::IgnoringCache,
            None,
            PayloadEncoding::Plain,
            || {
                std::future::ready(Err::<String, _>(FetchError::Transport {
                    reason: "down".to_string(),
                }))
            },
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(RequestError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_cache_and_load_suppresses_failure_after_hit() {
        let orch = orchestrator();
        let key = CacheKey::simple("feed");
        orch.store()
            .store(&"Y".to_string(), &key, Some(60), PayloadEncoding::Plain)
            .await;

        let stream = orch.request(
            key,
            CachePolicy::CacheAndLoad,
            None,
            PayloadEncoding::Plain,
            || {
                std::future::ready(Err::<String, _>(FetchError::Transport {
                    reason: "down".to_string(),
                }))
            },
        );
        let items = stream.collect_all().await;

        // The failed refresh is logged, not surfaced.
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().expect("success").value(), "Y");
    }

    #[tokio::test]
    async fn test_cache_and_load_failure_without_hit_surfaces() {
        let orch = orchestrator();

        let stream = orch.request(
            CacheKey::simple("feed"),
            CachePolicy::CacheAndLoad,
            None,
            PayloadEncoding::Plain,
            || {
                std::future::ready(Err::<String, _>(FetchError::Remote {
                    status: 500,
                    message: "boom".to_string(),
                }))
            },
        );
        let items = stream.collect_all().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(RequestError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_duplicate_looking_network_result_still_emitted() {
        let orch = orchestrator();
        let key = CacheKey::simple("feed");
        orch.store()
            .store(&"same".to_string(), &key, Some(60), PayloadEncoding::Plain)
            .await;

        let stream = orch.request(
            key,
            CachePolicy::CacheAndLoad,
            Some(60),
            PayloadEncoding::Plain,
            || std::future::ready(Ok("same".to_string())),
        );
        let items = stream.collect_all().await;

        // No deduplication: two emissions even though the values match.
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoning_the_stream_cancels_the_fetch() {
        let orch = orchestrator();
        let fetch_finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fetch_finished);

        let stream = orch.request(
            CacheKey::simple("slow"),
            CachePolicy::IgnoringCache,
            None,
            PayloadEncoding::Plain,
            move || async move {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                flag.store(true, Ordering::SeqCst);
                Ok("never".to_string())
            },
        );

        drop(stream);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!fetch_finished.load(Ordering::SeqCst));
    }
}
