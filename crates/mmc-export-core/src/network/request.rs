//! Request and response values that flow through the fetcher.

use crate::{ExportError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// HTTP methods the fetcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An outbound request. Method, URL, query and body fully determine its
/// fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// POST that only reads data (e.g. a fingerprint lookup) and may be cached.
    pub single_shot_query: bool,
}

impl FetchRequest {
    fn with_method(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            single_shot_query: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(HttpMethod::Get, url)
    }

    /// A POST whose body is a read-only query; cacheable like a GET.
    pub fn post_query(url: impl Into<String>, body: serde_json::Value) -> Self {
        let mut request = Self::with_method(HttpMethod::Post, url);
        request.body = Some(body);
        request.single_shot_query = true;
        request
    }

    /// A mutating POST; never cached.
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        let mut request = Self::with_method(HttpMethod::Post, url);
        request.body = Some(body);
        request
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Only retrieval-style requests are cached.
    pub fn is_cacheable(&self) -> bool {
        match self.method {
            HttpMethod::Get | HttpMethod::Head => true,
            HttpMethod::Post => self.single_shot_query,
            HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete => false,
        }
    }

    /// Deterministic cache key for this request.
    ///
    /// Query pairs are sorted and the JSON body is serialized canonically.
    /// Headers are excluded apart from `Accept`, which changes response shape.
    pub fn fingerprint(&self) -> String {
        let mut query = self.query.clone();
        query.sort();

        let accept = self
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .map(|(_, v)| v.as_str())
            .unwrap_or("");

        let body = self
            .body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.trim_end_matches('/').as_bytes());
        hasher.update(b"\n");
        for (key, value) in &query {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"&");
        }
        hasher.update(b"\n");
        hasher.update(accept.as_bytes());
        hasher.update(b"\n");
        hasher.update(body.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// URL with query pairs appended.
    pub fn full_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&self.url).map_err(|e| ExportError::Network {
            message: format!("Invalid URL {}: {}", self.url, e),
            cause: None,
        })?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.into())
    }
}

/// A response body with its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Whether the response may be stored in the cache.
    ///
    /// 404 is a definitive "not found" and is cached like a success.
    pub fn is_storable(&self) -> bool {
        self.is_success() || self.is_not_found()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ExportError::Json {
            message: format!("Failed to parse response body: {}", e),
            source: Some(e),
        })
    }
}
