//! Provider clients.
//!
//! Every provider exposes the same lookup capability set through the
//! [`Provider`] trait. The [`ProviderRegistry`] holds them in the fixed
//! priority order GitHub → CurseForge → Modrinth.

mod curseforge;
mod github;
mod modrinth;

pub use curseforge::CurseForgeProvider;
pub use github::GitHubProvider;
pub use modrinth::ModrinthProvider;

use crate::config::ProviderEndpoints;
use crate::models::{Distribution, LocalFile, ProviderCandidate, ProviderKind};
use crate::network::{CachedFetcher, FetchRequest, FetchResponse};
use crate::{ExportError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Uniform lookup capability set of a content-hosting provider.
///
/// Lookups return `Ok(None)` / an empty list for "no match". Errors are
/// reserved for transport or API failures.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Authoritative lookup by content hash; confidence `exact`.
    async fn lookup_by_hash(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>>;

    /// Lookup by the id embedded in the file's metadata; confidence `accurate`.
    async fn lookup_by_id(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>>;

    /// Name search in provider relevance order; confidence `loose`.
    async fn search_by_name(&self, name: &str) -> Result<Vec<ProviderCandidate>>;

    /// Redistribution permission for a candidate this provider produced.
    async fn check_distribution_permission(
        &self,
        _candidate: &ProviderCandidate,
    ) -> Result<Distribution> {
        Ok(Distribution::Allowed)
    }
}

/// Shared handle to a provider.
pub type DynProvider = Arc<dyn Provider>;

/// Providers in resolution priority order.
pub struct ProviderRegistry {
    providers: Vec<DynProvider>,
}

impl ProviderRegistry {
    /// Build a registry. Providers are ordered by [`ProviderKind::PRIORITY`]
    /// regardless of the order given; a later duplicate kind replaces an
    /// earlier one.
    pub fn new(providers: Vec<DynProvider>) -> Self {
        let mut ordered: Vec<DynProvider> = Vec::with_capacity(providers.len());
        for provider in providers {
            ordered.retain(|p| p.kind() != provider.kind());
            ordered.push(provider);
        }
        ordered.sort_by_key(|p| p.kind().priority());
        Self { providers: ordered }
    }

    /// The three real providers sharing one fetcher.
    pub fn for_endpoints(fetcher: Arc<CachedFetcher>, endpoints: &ProviderEndpoints) -> Self {
        Self::new(vec![
            Arc::new(GitHubProvider::new(
                fetcher.clone(),
                &endpoints.github,
                endpoints.github_token.clone(),
            )),
            Arc::new(CurseForgeProvider::new(
                fetcher.clone(),
                &endpoints.curseforge,
                endpoints.curseforge_api_key.clone(),
            )),
            Arc::new(ModrinthProvider::new(fetcher, &endpoints.modrinth)),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &DynProvider> {
        self.providers.iter()
    }

    /// Provider kinds in search order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

}

/// Decode a provider response: 404 is `None`, other non-success statuses
/// are provider API errors.
pub(crate) fn decode_json<T: DeserializeOwned>(
    provider: ProviderKind,
    request: &FetchRequest,
    response: &FetchResponse,
) -> Result<Option<T>> {
    if response.is_not_found() {
        return Ok(None);
    }
    if !response.is_success() {
        return Err(ExportError::ProviderApi {
            provider: provider.to_string(),
            message: format!("{} {} returned {}", request.method, request.url, response.status),
            status_code: Some(response.status),
        });
    }
    response.json().map(Some)
}

/// Fetch and decode in one step.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    fetcher: &CachedFetcher,
    provider: ProviderKind,
    request: &FetchRequest,
) -> Result<Option<T>> {
    let response = fetcher.fetch(request).await?;
    decode_json(provider, request, &response)
}

pub(crate) fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}
