//! Cache-backed fetcher shared by all provider clients.
//!
//! Lookup order for a cacheable request:
//! 1. In-memory TTL cache
//! 2. Disk cache (if a cache directory is configured)
//! 3. Network, with retry on transient errors
//!
//! Concurrent callers with the same fingerprint share one outstanding load.

use super::client::HttpClient;
use super::disk_cache::{CacheEntry, DiskCache};
use super::request::{FetchRequest, FetchResponse};
use super::retry::{retry_async, RetryConfig};
use crate::config::{CacheDefaults, NetworkConfig};
use crate::Result;
use mini_moka::sync::Cache;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Construction options for [`CachedFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Disk cache directory. `None` keeps the cache in memory only.
    pub cache_dir: Option<PathBuf>,
    /// Entry expiry. `None` keeps entries for the lifetime of the cache.
    pub ttl: Option<Duration>,
    pub retry: RetryConfig,
    pub timeout: Duration,
    pub memory_capacity: u64,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            cache_dir: None,
            ttl: Some(CacheDefaults::DEFAULT_TTL),
            retry: RetryConfig::default(),
            timeout: NetworkConfig::REQUEST_TIMEOUT,
            memory_capacity: CacheDefaults::MEMORY_CAPACITY,
        }
    }
}

impl FetcherOptions {
    /// Memory-only cache without retries, for tests and one-off runs.
    pub fn in_memory() -> Self {
        Self {
            retry: RetryConfig::none(),
            ..Self::default()
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Snapshot of fetcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetcherStats {
    pub network_calls: u64,
    pub memory_hits: u64,
    pub disk_hits: u64,
}

#[derive(Debug, Default)]
struct Counters {
    network_calls: AtomicU64,
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
}

type InFlight = Mutex<HashMap<String, Arc<OnceCell<FetchResponse>>>>;

/// HTTP fetcher with a two-tier response cache and in-flight dedup.
pub struct CachedFetcher {
    client: HttpClient,
    memory: Cache<String, FetchResponse>,
    disk: Option<DiskCache>,
    retry: RetryConfig,
    in_flight: InFlight,
    counters: Counters,
}

impl CachedFetcher {
    pub fn new(options: FetcherOptions) -> Result<Self> {
        let client = HttpClient::with_timeout(options.timeout)?;

        let mut builder = Cache::builder().max_capacity(options.memory_capacity);
        if let Some(ttl) = options.ttl {
            builder = builder.time_to_live(ttl);
        }

        let disk = options
            .cache_dir
            .map(|dir| DiskCache::new(dir, options.ttl));
        if let Some(disk) = &disk {
            debug!("Response cache at {}", disk.root().display());
        }

        Ok(Self {
            client,
            memory: builder.build(),
            disk,
            retry: options.retry,
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        })
    }

    /// Memory-only fetcher without retries.
    pub fn in_memory() -> Result<Self> {
        Self::new(FetcherOptions::in_memory())
    }

    pub fn stats(&self) -> FetcherStats {
        FetcherStats {
            network_calls: self.counters.network_calls.load(Ordering::SeqCst),
            memory_hits: self.counters.memory_hits.load(Ordering::SeqCst),
            disk_hits: self.counters.disk_hits.load(Ordering::SeqCst),
        }
    }

    /// Fetch a response, serving cacheable requests from cache when possible.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        if !request.is_cacheable() {
            return self.fetch_network(request).await;
        }

        let fingerprint = request.fingerprint();
        if let Some(response) = self.memory.get(&fingerprint) {
            self.counters.memory_hits.fetch_add(1, Ordering::SeqCst);
            debug!("Memory cache hit for {} {}", request.method, request.url);
            return Ok(response);
        }

        let cell = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            in_flight
                .entry(fingerprint.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_try_init(|| self.load(&fingerprint, request))
            .await
            .cloned();

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if in_flight
                .get(&fingerprint)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                in_flight.remove(&fingerprint);
            }
        }

        result
    }

    async fn load(&self, fingerprint: &str, request: &FetchRequest) -> Result<FetchResponse> {
        // An earlier load may have finished between the caller's memory miss
        // and its in-flight registration.
        if let Some(response) = self.memory.get(&fingerprint.to_string()) {
            self.counters.memory_hits.fetch_add(1, Ordering::SeqCst);
            return Ok(response);
        }

        if let Some(entry) = self.disk.as_ref().and_then(|d| d.lookup(fingerprint)) {
            self.counters.disk_hits.fetch_add(1, Ordering::SeqCst);
            debug!("Disk cache hit for {} {}", request.method, request.url);
            let response = entry.to_response();
            self.memory.insert(fingerprint.to_string(), response.clone());
            return Ok(response);
        }

        debug!("Cache miss for {} {}", request.method, request.url);
        let response = self.fetch_network(request).await?;

        if response.is_storable() {
            self.memory.insert(fingerprint.to_string(), response.clone());
            if let Some(disk) = &self.disk {
                if let Err(e) = disk.write(&CacheEntry::new(fingerprint, &response)) {
                    warn!("Failed to persist cache entry {}: {}", fingerprint, e);
                }
            }
        }

        Ok(response)
    }

    async fn fetch_network(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let (result, stats) = retry_async(&self.retry, || {
            self.counters.network_calls.fetch_add(1, Ordering::SeqCst);
            self.client.execute(request)
        })
        .await;

        if stats.attempts > 1 {
            debug!(
                "{} {} took {} attempts ({:?} backoff)",
                request.method, request.url, stats.attempts, stats.total_delay
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_repeated_lookup_hits_network_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/version_file/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"v1\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = CachedFetcher::in_memory().unwrap();
        let request = FetchRequest::get(format!("{}/v2/version_file/abc", server.uri()));

        let first = fetcher.fetch(&request).await.unwrap();
        let second = fetcher.fetch(&request).await.unwrap();

        assert_eq!(first, second);
        let stats = fetcher.stats();
        assert_eq!(stats.network_calls, 1);
        assert_eq!(stats.memory_hits, 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_are_deduplicated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Arc::new(CachedFetcher::in_memory().unwrap());
        let request = FetchRequest::get(format!("{}/slow", server.uri()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let fetcher = fetcher.clone();
                let request = request.clone();
                tokio::spawn(async move { fetcher.fetch(&request).await })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap().body, b"[]".to_vec());
        }
        assert_eq!(fetcher.stats().network_calls, 1);
    }

    #[tokio::test]
    async fn test_late_caller_reuses_finished_load() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/project/AANobbMI"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"AANobbMI\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = CachedFetcher::in_memory().unwrap();
        let request = FetchRequest::get(format!("{}/v2/project/AANobbMI", server.uri()));
        let fingerprint = request.fingerprint();

        // Both loads run as if each caller had missed memory before the
        // other's response landed and its in-flight cell was dropped.
        let first = fetcher.load(&fingerprint, &request).await.unwrap();
        let second = fetcher.load(&fingerprint, &request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.stats().network_calls, 1);
        assert_eq!(fetcher.stats().memory_hits, 1);
    }

    #[tokio::test]
    async fn test_disk_cache_survives_new_fetcher() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/mods/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":{}}"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let request = FetchRequest::get(format!("{}/v1/mods/42", server.uri()));

        let first = CachedFetcher::new(FetcherOptions::in_memory().with_cache_dir(dir.path()))
            .unwrap();
        first.fetch(&request).await.unwrap();

        let second = CachedFetcher::new(FetcherOptions::in_memory().with_cache_dir(dir.path()))
            .unwrap();
        let response = second.fetch(&request).await.unwrap();

        assert_eq!(response.body, b"{\"data\":{}}".to_vec());
        assert_eq!(second.stats().disk_hits, 1);
        assert_eq!(second.stats().network_calls, 0);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = CachedFetcher::in_memory().unwrap();
        let request = FetchRequest::get(format!("{}/missing", server.uri()));
        assert!(fetcher.fetch(&request).await.unwrap().is_not_found());
        assert!(fetcher.fetch(&request).await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_forbidden_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(path("/denied"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = CachedFetcher::in_memory().unwrap();
        let request = FetchRequest::get(format!("{}/denied", server.uri()));
        fetcher.fetch(&request).await.unwrap();
        fetcher.fetch(&request).await.unwrap();
        assert_eq!(fetcher.stats().network_calls, 2);
    }

    #[tokio::test]
    async fn test_mutating_post_bypasses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = CachedFetcher::in_memory().unwrap();
        let request = FetchRequest::post(format!("{}/submit", server.uri()), json!({"a": 1}));
        fetcher.fetch(&request).await.unwrap();
        fetcher.fetch(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_query_post_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/fingerprints"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":{}}"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = CachedFetcher::in_memory().unwrap();
        let request = FetchRequest::post_query(
            format!("{}/v1/fingerprints", server.uri()),
            json!({"fingerprints": [123]}),
        );
        fetcher.fetch(&request).await.unwrap();
        fetcher.fetch(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let retry = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(5))
            .with_jitter(false);
        let fetcher = CachedFetcher::new(FetcherOptions::in_memory().with_retry(retry)).unwrap();

        let response = fetcher
            .fetch(&FetchRequest::get(format!("{}/flaky", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.body, b"ok".to_vec());
        assert_eq!(fetcher.stats().network_calls, 2);
    }
}
