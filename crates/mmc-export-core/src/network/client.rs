//! Thin reqwest wrapper shared by every provider.
//!
//! One `reqwest::Client` means one connection pool for the whole run.
//! Responses are read in full; callers get the status and body bytes.
//!
//! Status handling:
//! - 429 becomes [`ExportError::RateLimited`] with the `Retry-After` seconds
//! - 408 and 5xx become a retryable [`ExportError::ProviderApi`]
//! - everything else (404 included) is returned as a response
//!
//! GitHub and Modrinth report their request budget in `X-RateLimit-*`
//! headers. When the budget runs low, requests are spaced out.

use super::request::{FetchRequest, FetchResponse, HttpMethod};
use crate::config::{AppConfig, NetworkConfig};
use crate::{ExportError, Result};
use reqwest::{header, Client, Method, StatusCode};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Last request budget a provider reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub remaining: u64,
    pub limit: u64,
}

impl RateBudget {
    /// Below a tenth of the limit (and never below one request).
    pub fn is_low(&self) -> bool {
        self.limit > 0 && self.remaining < (self.limit / 10).max(1)
    }

    fn from_headers(headers: &header::HeaderMap) -> Option<Self> {
        let read = |name: &str| -> Option<u64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        };
        Some(Self {
            remaining: read("x-ratelimit-remaining")?,
            limit: read("x-ratelimit-limit")?,
        })
    }
}

pub struct HttpClient {
    client: Client,
    timeout: Duration,
    budget: Mutex<Option<RateBudget>>,
}

impl HttpClient {
    /// Client whose requests fail with [`ExportError::Timeout`] after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(AppConfig::USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout.min(NetworkConfig::CONNECT_TIMEOUT))
            .build()
            .map_err(|e| ExportError::Network {
                message: format!("Cannot build HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            timeout,
            budget: Mutex::new(None),
        })
    }

    pub fn rate_budget(&self) -> Option<RateBudget> {
        *self.budget.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn execute(&self, request: &FetchRequest) -> Result<FetchResponse> {
        if let Some(budget) = self.rate_budget().filter(RateBudget::is_low) {
            warn!(
                "Rate budget low ({}/{} left), pausing {:?}",
                budget.remaining,
                budget.limit,
                NetworkConfig::THROTTLE_DELAY
            );
            tokio::time::sleep(NetworkConfig::THROTTLE_DELAY).await;
        }

        let url = request.full_url()?;
        let mut builder = self.client.request(method_of(request.method), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e, &url))?;
        if let Some(budget) = RateBudget::from_headers(response.headers()) {
            *self.budget.lock().unwrap_or_else(|e| e.into_inner()) = Some(budget);
        }

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExportError::RateLimited {
                service: host_of(&url),
                retry_after_secs: response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok()),
            });
        }
        if is_transient_status(status) {
            return Err(ExportError::ProviderApi {
                provider: host_of(&url),
                message: format!("{} {} answered {}", request.method, url, status),
                status_code: Some(status.as_u16()),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e, &url))?;
        debug!("{} {} -> {}", request.method, url, status);

        Ok(FetchResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }

    fn transport_error(&self, err: reqwest::Error, url: &str) -> ExportError {
        if err.is_timeout() {
            return ExportError::Timeout(self.timeout);
        }
        ExportError::Network {
            message: format!("Request to {} failed", url),
            cause: Some(err.to_string()),
        }
    }
}

/// Statuses worth another attempt.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn method_of(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Host part of a URL, for error messages.
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
