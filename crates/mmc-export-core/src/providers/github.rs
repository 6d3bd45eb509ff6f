//! GitHub releases provider.
//!
//! GitHub has no global file index, so hash and id lookups need a
//! repository hint taken from the file's source URL or an `owner/repo`
//! embedded id. Release assets carry a `sha256:` digest; older assets
//! without one are matched on file name and size, which only counts as an
//! accurate match.

use super::{fetch_json, trim_base, Provider};
use crate::config::ProviderUrls;
use crate::models::{
    Distribution, HashAlgorithm, LocalFile, MatchConfidence, ProviderCandidate, ProviderKind,
};
use crate::network::{CachedFetcher, FetchRequest};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
struct GitHubAsset {
    id: u64,
    name: String,
    size: u64,
    browser_download_url: String,
    #[serde(default)]
    digest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct RepositorySearch {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    name: String,
}

/// Client for the GitHub REST API.
pub struct GitHubProvider {
    fetcher: Arc<CachedFetcher>,
    base_url: String,
    token: Option<String>,
}

impl GitHubProvider {
    pub fn new(fetcher: Arc<CachedFetcher>, base_url: &str, token: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: trim_base(base_url),
            token,
        }
    }

    fn request(&self, path: &str) -> FetchRequest {
        let mut request = FetchRequest::get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    async fn releases(&self, repo: &str) -> Result<Vec<GitHubRelease>> {
        let request = self.request(&format!("/repos/{}/releases", repo)).query(
            "per_page",
            ProviderUrls::GITHUB_RELEASES_PER_PAGE.to_string(),
        );
        let releases: Option<Vec<GitHubRelease>> =
            fetch_json(&self.fetcher, ProviderKind::GitHub, &request).await?;
        Ok(releases
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.draft)
            .collect())
    }

    async fn latest_release(&self, repo: &str) -> Result<Option<GitHubRelease>> {
        let request = self.request(&format!("/repos/{}/releases/latest", repo));
        fetch_json(&self.fetcher, ProviderKind::GitHub, &request).await
    }

    /// First asset across releases (newest first) accepted by `matches`.
    fn find_asset<'a>(
        releases: &'a [GitHubRelease],
        matches: impl Fn(&GitHubAsset) -> bool,
    ) -> Option<(&'a GitHubRelease, &'a GitHubAsset)> {
        releases
            .iter()
            .find_map(|release| release.assets.iter().find(|&a| matches(a)).map(|a| (release, a)))
    }

    fn candidate(
        repo: &str,
        release: &GitHubRelease,
        asset: &GitHubAsset,
        confidence: MatchConfidence,
    ) -> ProviderCandidate {
        ProviderCandidate::new(ProviderKind::GitHub, repo, repo_name(repo), confidence)
            .with_file_id(asset.id.to_string())
            .with_version(release.tag_name.clone())
            .with_download_url(Some(asset.browser_download_url.clone()))
            .with_distribution(Distribution::Allowed)
    }

    fn search_candidate(repo: Repository) -> ProviderCandidate {
        ProviderCandidate::new(
            ProviderKind::GitHub,
            repo.full_name,
            repo.name,
            MatchConfidence::Loose,
        )
        .with_distribution(Distribution::Allowed)
    }

    /// Attach the newest release's jar. A failed release lookup leaves the
    /// candidate without file details.
    async fn with_latest_jar(&self, candidate: ProviderCandidate) -> ProviderCandidate {
        let release = match self.latest_release(&candidate.external_id).await {
            Ok(Some(release)) => release,
            Ok(None) => return candidate,
            Err(e) => {
                warn!(
                    "Latest release of {} unavailable: {}",
                    candidate.external_id, e
                );
                return candidate;
            }
        };

        let mut candidate = candidate;
        if let Some(asset) = release.assets.iter().find(|a| a.name.ends_with(".jar")) {
            candidate = candidate
                .with_file_id(asset.id.to_string())
                .with_download_url(Some(asset.browser_download_url.clone()));
        }
        candidate.with_version(release.tag_name)
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn lookup_by_hash(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        let Some(repo) = repository_hint(file) else {
            return Ok(None);
        };
        let sha256 = file.hash(HashAlgorithm::Sha256).map(|h| format!("sha256:{}", h));
        let file_name = file.file_name();

        let releases = self.releases(&repo).await?;
        let found = Self::find_asset(&releases, |asset| match (&asset.digest, &sha256) {
            (Some(digest), Some(expected)) => digest.eq_ignore_ascii_case(expected),
            (None, _) => asset.name == file_name && asset.size == file.size_bytes,
            (Some(_), None) => false,
        });

        Ok(found.map(|(release, asset)| {
            // Name and size alone are not a content match.
            let confidence = if asset.digest.is_some() {
                MatchConfidence::Exact
            } else {
                MatchConfidence::Accurate
            };
            debug!("GitHub {} match for {} in {}", confidence, file_name, repo);
            Self::candidate(&repo, release, asset, confidence)
        }))
    }

    async fn lookup_by_id(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        let Some(repo) = repository_hint(file) else {
            return Ok(None);
        };
        let file_name = file.file_name();

        let releases = self.releases(&repo).await?;
        Ok(Self::find_asset(&releases, |asset| asset.name == file_name)
            .map(|(release, asset)| Self::candidate(&repo, release, asset, MatchConfidence::Accurate)))
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<ProviderCandidate>> {
        let request = self
            .request("/search/repositories")
            .query("q", format!("{} in:name topic:minecraft-mod", name))
            .query("per_page", ProviderUrls::SEARCH_LIMIT.to_string());
        let search: Option<RepositorySearch> =
            fetch_json(&self.fetcher, ProviderKind::GitHub, &request).await?;
        let mut candidates: Vec<_> = search
            .map(|s| s.items)
            .unwrap_or_default()
            .into_iter()
            .map(Self::search_candidate)
            .collect();

        // Only the top hit is ever used, so only it gets release details.
        if let Some(top) = candidates.first_mut() {
            *top = self.with_latest_jar(top.clone()).await;
        }
        Ok(candidates)
    }
}

/// `owner/repo` from a GitHub source URL or an embedded id of that shape.
pub(crate) fn repository_hint(file: &LocalFile) -> Option<String> {
    if let Some(repo) = file.source_url.as_deref().and_then(repo_from_url) {
        return Some(repo);
    }
    file.embedded_id
        .as_deref()
        .filter(|id| is_repo_slug(id))
        .map(str::to_string)
}

fn repo_from_url(source: &str) -> Option<String> {
    let url = url::Url::parse(source).ok()?;
    let host = url.host_str()?;
    if host != "github.com" && host != "www.github.com" {
        return None;
    }
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?.trim_end_matches(".git");
    let slug = format!("{}/{}", owner, repo);
    is_repo_slug(&slug).then_some(slug)
}

fn is_repo_slug(value: &str) -> bool {
    let mut parts = value.split('/');
    let valid = |part: Option<&str>| {
        part.is_some_and(|p| {
            !p.is_empty()
                && p
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
    };
    valid(parts.next()) && valid(parts.next()) && parts.next().is_none()
}

fn repo_name(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}
