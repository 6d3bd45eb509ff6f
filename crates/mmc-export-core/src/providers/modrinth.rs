//! Modrinth provider.

use super::{fetch_json, trim_base, Provider};
use crate::config::ProviderUrls;
use crate::models::{
    Distribution, HashAlgorithm, LocalFile, MatchConfidence, ProviderCandidate, ProviderKind,
};
use crate::network::{CachedFetcher, FetchRequest};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct Version {
    id: String,
    project_id: String,
    version_number: String,
    #[serde(default)]
    files: Vec<VersionFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct VersionFile {
    #[serde(default)]
    hashes: HashMap<String, String>,
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
struct Project {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    project_id: String,
    title: String,
    #[serde(default)]
    latest_version: Option<String>,
}

/// Client for the Modrinth v2 API.
pub struct ModrinthProvider {
    fetcher: Arc<CachedFetcher>,
    base_url: String,
}

impl ModrinthProvider {
    pub fn new(fetcher: Arc<CachedFetcher>, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: trim_base(base_url),
        }
    }

    fn request(&self, path: &str) -> FetchRequest {
        FetchRequest::get(format!("{}/v2{}", self.base_url, path)).header("Accept", "application/json")
    }

    async fn project_title(&self, project_id: &str) -> Result<String> {
        let request = self.request(&format!("/project/{}", urlencoding::encode(project_id)));
        let project: Option<Project> =
            fetch_json(&self.fetcher, ProviderKind::Modrinth, &request).await?;
        Ok(project
            .map(|p| p.title)
            .unwrap_or_else(|| project_id.to_string()))
    }

    async fn candidate(
        &self,
        version: &Version,
        file: Option<&VersionFile>,
        confidence: MatchConfidence,
    ) -> Result<ProviderCandidate> {
        let title = self.project_title(&version.project_id).await?;
        let file = file.or_else(|| primary_file(version));
        Ok(
            ProviderCandidate::new(ProviderKind::Modrinth, &version.project_id, title, confidence)
                .with_file_id(version.id.clone())
                .with_version(version.version_number.clone())
                .with_download_url(file.map(|f| f.url.clone()))
                .with_distribution(Distribution::Allowed),
        )
    }
}

#[async_trait]
impl Provider for ModrinthProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Modrinth
    }

    async fn lookup_by_hash(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        let Some((algorithm, digest)) = [HashAlgorithm::Sha512, HashAlgorithm::Sha1]
            .into_iter()
            .find_map(|alg| file.hash(alg).map(|h| (alg, h)))
        else {
            return Ok(None);
        };

        let request = self
            .request(&format!("/version_file/{}", digest))
            .query("algorithm", algorithm.as_str());
        let version: Option<Version> =
            fetch_json(&self.fetcher, ProviderKind::Modrinth, &request).await?;
        let Some(version) = version else {
            return Ok(None);
        };

        let matched = find_file(&version, |f| {
            f.hashes
                .get(algorithm.as_str())
                .is_some_and(|h| h.eq_ignore_ascii_case(digest))
        });
        self.candidate(&version, matched, MatchConfidence::Exact)
            .await
            .map(Some)
    }

    async fn lookup_by_id(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        let Some(project_id) = file.embedded_id.as_deref() else {
            return Ok(None);
        };

        let request = self.request(&format!("/project/{}/version", urlencoding::encode(project_id)));
        let versions: Option<Vec<Version>> =
            fetch_json(&self.fetcher, ProviderKind::Modrinth, &request).await?;
        let file_name = file.file_name();

        for version in versions.unwrap_or_default() {
            let matched = find_file(&version, |f| {
                f.filename == file_name
                    || f.hashes.iter().any(|(alg, digest)| {
                        file.content_hashes
                            .iter()
                            .any(|(a, d)| a.as_str() == alg && d.eq_ignore_ascii_case(digest))
                    })
            });
            if matched.is_some() {
                return self
                    .candidate(&version, matched, MatchConfidence::Accurate)
                    .await
                    .map(Some);
            }
        }
        Ok(None)
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<ProviderCandidate>> {
        let request = self
            .request("/search")
            .query("query", name)
            .query("limit", ProviderUrls::SEARCH_LIMIT.to_string());
        let results: Option<SearchResults> =
            fetch_json(&self.fetcher, ProviderKind::Modrinth, &request).await?;

        Ok(results
            .map(|r| r.hits)
            .unwrap_or_default()
            .into_iter()
            .map(|hit| {
                let mut candidate = ProviderCandidate::new(
                    ProviderKind::Modrinth,
                    hit.project_id,
                    hit.title,
                    MatchConfidence::Loose,
                )
                .with_distribution(Distribution::Allowed);
                if let Some(version) = hit.latest_version {
                    candidate = candidate.with_file_id(version);
                }
                candidate
            })
            .collect())
    }
}

fn find_file(version: &Version, matches: impl Fn(&VersionFile) -> bool) -> Option<&VersionFile> {
    version.files.iter().find(|&f| matches(f))
}

fn primary_file(version: &Version) -> Option<&VersionFile> {
    version
        .files
        .iter()
        .find(|f| f.primary)
        .or_else(|| version.files.first())
}
