//! Network layer: HTTP client, retry, and the cache-backed fetcher.

mod client;
mod disk_cache;
mod fetcher;
mod request;
mod retry;

pub use client::{host_of, is_transient_status, HttpClient, RateBudget};
pub use disk_cache::{CacheEntry, DiskCache};
pub use fetcher::{CachedFetcher, FetcherOptions, FetcherStats};
pub use request::{FetchRequest, FetchResponse, HttpMethod};
pub use retry::{retry_async, RetryConfig, RetryStats};
