//! Request cache with LRU eviction and TTL support.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use serde_json::Value;
use sigil_client::{GraphQLClient, GraphQLRequest};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::ttl::TtlTracker;

/// Identity of a cached query: operation name plus canonical variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub operation: String,
    pub variables: String,
}

impl QueryKey {
    /// Key for a request. Variables are canonicalised (object keys sorted).
    pub fn for_request(request: &GraphQLRequest) -> Self {
        Self {
            operation: request.operation().to_string(),
            variables: request.variables.to_string(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variables == "null" {
            f.write_str(&self.operation)
        } else {
            write!(f, "{}({})", self.operation, self.variables)
        }
    }
}

/// Outcome stored for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResult {
    /// The `data` object the server returned.
    Data(Value),
    /// The query failed; holds the error message.
    Error(String),
}

/// How a query consults the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Serve cached data when present, otherwise fetch and cache.
    #[default]
    CacheFirst,
    /// Always fetch, then cache.
    NetworkOnly,
    /// Never touch the network.
    CacheOnly,
}

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    request: GraphQLRequest,
    result: CachedResult,
    fetched_at: Instant,
}

struct CacheInner {
    lru: LruCache<QueryKey, CacheEntry>,
    ttl: TtlTracker<QueryKey>,
    /// Bumped by every reset; a fetch started before a reset is discarded.
    generation: u64,
}

/// Normalized cache of prior query results.
///
/// Clones share the same storage. No lock is held while a request is in
/// flight, so an unauthenticated response can reset the cache mid-refetch.
#[derive(Clone)]
pub struct RequestCache {
    inner: Arc<RwLock<CacheInner>>,
    config: CacheConfig,
}

impl RequestCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        let inner = CacheInner {
            lru: LruCache::new(cap),
            ttl: TtlTracker::new(config.ttl),
            generation: 0,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of cached entries (including expired ones not yet cleaned up).
    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }

    /// Check if a live entry exists for `key`.
    pub async fn contains(&self, key: &QueryKey) -> bool {
        let inner = self.inner.read().await;
        inner.lru.contains(key) && !inner.ttl.is_expired(key)
    }

    /// Peek at a cached result without updating LRU order or TTL.
    pub async fn peek(&self, key: &QueryKey) -> Option<CachedResult> {
        let inner = self.inner.read().await;
        if inner.ttl.is_expired(key) {
            None
        } else {
            inner.lru.peek(key).map(|e| e.result.clone())
        }
    }

    /// When the entry for `key` was last fetched.
    pub async fn fetched_at(&self, key: &QueryKey) -> Option<Instant> {
        let inner = self.inner.read().await;
        inner.lru.peek(key).map(|e| e.fetched_at)
    }

    /// Store a result for a request.
    pub async fn put(&self, request: &GraphQLRequest, result: CachedResult) {
        let mut inner = self.inner.write().await;
        Self::insert(&mut inner, &self.config, request, result);
    }

    /// Store a result only if no reset happened since `generation`.
    async fn put_if_current(
        &self,
        generation: u64,
        request: &GraphQLRequest,
        result: CachedResult,
    ) {
        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            debug!(
                operation = %request.operation(),
                "Discarding result fetched before cache reset"
            );
            return;
        }
        Self::insert(&mut inner, &self.config, request, result);
    }

    fn insert(
        inner: &mut CacheInner,
        config: &CacheConfig,
        request: &GraphQLRequest,
        result: CachedResult,
    ) {
        let key = QueryKey::for_request(request);

        if !inner.lru.contains(&key)
            && inner.lru.len() >= config.max_entries
            && let Some((evicted, _)) = inner.lru.peek_lru()
        {
            let evicted = evicted.clone();
            debug!(key = %evicted, "Evicting LRU query result to make room");
            inner.ttl.remove(&evicted);
        }

        inner.lru.put(
            key.clone(),
            CacheEntry {
                request: request.clone(),
                result,
                fetched_at: Instant::now(),
            },
        );
        inner.ttl.touch(&key);

        trace!(key = %key, cache_size = inner.lru.len(), "Query result cached");
    }

    /// Look up fresh cached data, touching LRU order and TTL.
    async fn cached_data(&self, key: &QueryKey) -> Option<CachedResult> {
        let mut inner = self.inner.write().await;
        if inner.ttl.is_expired(key) {
            if inner.lru.pop(key).is_some() {
                debug!(key = %key, "Cached query result expired");
            }
            inner.ttl.remove(key);
            return None;
        }
        let result = inner.lru.get(key).map(|e| e.result.clone());
        if result.is_some() {
            inner.ttl.touch(key);
        }
        result
    }

    /// Run a query through the cache according to `policy`.
    ///
    /// Failed fetches are cached as [`CachedResult::Error`] and never served
    /// by `CacheFirst`. Unauthenticated failures are not cached.
    pub async fn query(
        &self,
        client: &GraphQLClient,
        request: &GraphQLRequest,
        policy: FetchPolicy,
    ) -> Result<Value, CacheError> {
        let key = QueryKey::for_request(request);

        match policy {
            FetchPolicy::CacheOnly => {
                return match self.cached_data(&key).await {
                    Some(CachedResult::Data(data)) => Ok(data),
                    Some(CachedResult::Error(message)) => Err(CacheError::CachedFailure(message)),
                    None => Err(CacheError::Miss(key.to_string())),
                };
            }
            FetchPolicy::CacheFirst => {
                if let Some(CachedResult::Data(data)) = self.cached_data(&key).await {
                    trace!(key = %key, "Serving query from cache");
                    return Ok(data);
                }
            }
            FetchPolicy::NetworkOnly => {}
        }

        self.fetch(client, request).await
    }

    async fn fetch(
        &self,
        client: &GraphQLClient,
        request: &GraphQLRequest,
    ) -> Result<Value, CacheError> {
        let generation = self.inner.read().await.generation;
        match client.execute_raw(request).await {
            Ok(data) => {
                self.put_if_current(generation, request, CachedResult::Data(data.clone()))
                    .await;
                Ok(data)
            }
            Err(e) if e.is_unauthenticated() => Err(e.into()),
            Err(e) => {
                self.put_if_current(generation, request, CachedResult::Error(e.user_message()))
                    .await;
                Err(e.into())
            }
        }
    }

    /// Re-execute every cached query whose operation is in `operations`.
    ///
    /// Each entry adopts whatever the server returns, including an error.
    /// Returns the number of queries re-executed.
    pub async fn refetch<S: AsRef<str>>(&self, client: &GraphQLClient, operations: &[S]) -> usize {
        let requests: Vec<GraphQLRequest> = {
            let inner = self.inner.read().await;
            inner
                .lru
                .iter()
                .filter(|(key, _)| operations.iter().any(|op| op.as_ref() == key.operation))
                .map(|(_, entry)| entry.request.clone())
                .collect()
        };

        let count = requests.len();
        for request in requests {
            debug!(operation = %request.operation(), "Refetching identity-dependent query");
            let _ = self.fetch(client, &request).await;
        }
        count
    }

    /// Drop every cached entry. Returns how many were dropped.
    pub async fn reset_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let count = inner.lru.len();
        inner.lru.clear();
        inner.ttl.clear();
        inner.generation = inner.generation.wrapping_add(1);
        debug!(count = count, "Request cache reset");
        count
    }

    /// Remove one entry.
    pub async fn invalidate(&self, key: &QueryKey) {
        let mut inner = self.inner.write().await;
        inner.ttl.remove(key);
        if inner.lru.pop(key).is_some() {
            debug!(key = %key, "Query result invalidated");
        }
    }

    /// Clean up expired entries. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired = inner.ttl.drain_expired();
        let mut count = 0;
        for key in expired {
            if inner.lru.pop(&key).is_some() {
                count += 1;
            }
        }
        if count > 0 {
            debug!(count = count, "Cleaned up expired query results");
        }
        count
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            size: inner.lru.len(),
            capacity: self.config.max_entries,
            ttl_tracked: inner.ttl.len(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of cached entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Number of entries being tracked for TTL.
    pub ttl_tracked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(op: &str) -> GraphQLRequest {
        GraphQLRequest::new(op, format!("query {} {{ x }}", op))
    }

    fn client(server: &MockServer) -> GraphQLClient {
        GraphQLClient::builder()
            .base_url(server.uri())
            .retry(sigil_client::RetryPolicy::none())
            .build()
            .unwrap()
    }

    #[test]
    fn test_query_key_canonical_variables() {
        let a = request("Items").with_variables(json!({"b": 2, "a": 1}));
        let b = request("Items").with_variables(json!({"a": 1, "b": 2}));
        assert_eq!(QueryKey::for_request(&a), QueryKey::for_request(&b));

        let c = request("Items").with_variables(json!({"a": 2}));
        assert_ne!(QueryKey::for_request(&a), QueryKey::for_request(&c));
        assert_eq!(QueryKey::for_request(&request("Me")).to_string(), "Me");
    }

    #[tokio::test]
    async fn test_put_and_peek() {
        let cache = RequestCache::new(CacheConfig::new());
        let req = request("Me");
        cache.put(&req, CachedResult::Data(json!({"me": null}))).await;

        let key = QueryKey::for_request(&req);
        assert!(cache.contains(&key).await);
        assert_eq!(cache.peek(&key).await, Some(CachedResult::Data(json!({"me": null}))));
        assert!(cache.fetched_at(&key).await.is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = RequestCache::new(CacheConfig::new().with_max_entries(2));
        for op in ["A", "B", "C"] {
            cache.put(&request(op), CachedResult::Data(json!({}))).await;
        }

        assert_eq!(cache.len().await, 2);
        assert!(!cache.contains(&QueryKey::for_request(&request("A"))).await);
        assert!(cache.contains(&QueryKey::for_request(&request("C"))).await);
    }

    #[tokio::test]
    async fn test_reset_all() {
        let cache = RequestCache::new(CacheConfig::new());
        cache.put(&request("A"), CachedResult::Data(json!({}))).await;
        cache.put(&request("B"), CachedResult::Error("boom".into())).await;

        assert_eq!(cache.reset_all().await, 2);
        assert!(cache.is_empty().await);
        assert_eq!(cache.stats().await.ttl_tracked, 0);
        assert_eq!(cache.reset_all().await, 0);
    }

    #[tokio::test]
    async fn test_ttl_expiration_and_cleanup() {
        let cache = RequestCache::new(CacheConfig::new().with_ttl(Duration::from_millis(30)));
        cache.put(&request("A"), CachedResult::Data(json!({}))).await;
        let key = QueryKey::for_request(&request("A"));
        assert!(cache.contains(&key).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!cache.contains(&key).await);
        assert_eq!(cache.cleanup_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_first_hits_network_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"me": {"id": 1, "name": "A"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = RequestCache::new(CacheConfig::new());
        let client = client(&server);
        let req = request("Me");

        let first = cache.query(&client, &req, FetchPolicy::CacheFirst).await.unwrap();
        let second = cache.query(&client, &req, FetchPolicy::CacheFirst).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first["me"]["name"], "A");
    }

    #[tokio::test]
    async fn test_cache_only_miss() {
        let server = MockServer::start().await;
        let cache = RequestCache::new(CacheConfig::new());
        let result = cache
            .query(&client(&server), &request("Me"), FetchPolicy::CacheOnly)
            .await;
        assert!(matches!(result, Err(CacheError::Miss(ref k)) if k == "Me"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_cached_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "boom"}]
            })))
            .mount(&server)
            .await;

        let cache = RequestCache::new(CacheConfig::new());
        let client = client(&server);
        let req = request("Items");

        assert!(cache.query(&client, &req, FetchPolicy::NetworkOnly).await.is_err());
        let key = QueryKey::for_request(&req);
        assert_eq!(cache.peek(&key).await, Some(CachedResult::Error("boom".into())));

        let cached = cache.query(&client, &req, FetchPolicy::CacheOnly).await;
        assert!(matches!(cached, Err(CacheError::CachedFailure(ref m)) if m == "boom"));
    }

    #[tokio::test]
    async fn test_refetch_only_named_operations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"operationName": "Me"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"me": {"id": 2, "name": "B"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = RequestCache::new(CacheConfig::new());
        cache.put(&request("Me"), CachedResult::Data(json!({"me": null}))).await;
        cache.put(&request("Items"), CachedResult::Data(json!({"items": []}))).await;

        let refetched = cache.refetch(&client(&server), &["Me"]).await;
        assert_eq!(refetched, 1);

        let me = cache.peek(&QueryKey::for_request(&request("Me"))).await;
        assert_eq!(me, Some(CachedResult::Data(json!({"me": {"id": 2, "name": "B"}}))));
        let items = cache.peek(&QueryKey::for_request(&request("Items"))).await;
        assert_eq!(items, Some(CachedResult::Data(json!({"items": []}))));
    }

    #[tokio::test]
    async fn test_refetch_adopts_error_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let cache = RequestCache::new(CacheConfig::new());
        cache.put(&request("Me"), CachedResult::Data(json!({"me": null}))).await;

        assert_eq!(cache.refetch(&client(&server), &["Me"]).await, 1);
        let me = cache.peek(&QueryKey::for_request(&request("Me"))).await;
        assert!(matches!(me, Some(CachedResult::Error(_))));
    }

    #[tokio::test]
    async fn test_reset_during_fetch_discards_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"me": {"id": 1, "name": "A"}}}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let cache = RequestCache::new(CacheConfig::new());
        let client = client(&server);
        let req = request("Me");

        let (result, cleared) = tokio::join!(
            cache.query(&client, &req, FetchPolicy::NetworkOnly),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cache.reset_all().await
            }
        );

        assert_eq!(cleared, 0);
        assert!(result.is_ok());
        assert!(cache.is_empty().await);
        assert_eq!(cache.peek(&QueryKey::for_request(&req)).await, None);

        // Fetches started after the reset are cached again.
        cache.query(&client, &req, FetchPolicy::NetworkOnly).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }
}
