//! CurseForge provider.
//!
//! Hash lookups post the file's murmur2 fingerprint to the fingerprint
//! index. CurseForge is the only provider whose authors may forbid
//! third-party distribution, so candidates carry the mod's
//! `allowModDistribution` flag, and a file without a download URL is denied.

use super::{fetch_json, trim_base, Provider};
use crate::config::ProviderUrls;
use crate::models::{
    Distribution, HashAlgorithm, LocalFile, MatchConfidence, ProviderCandidate, ProviderKind,
};
use crate::network::{CachedFetcher, FetchRequest};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintMatches {
    #[serde(default)]
    exact_matches: Vec<FingerprintMatch>,
}

#[derive(Debug, Deserialize)]
struct FingerprintMatch {
    id: u64,
    file: CurseFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseFile {
    id: u64,
    display_name: String,
    file_name: String,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseMod {
    id: u64,
    name: String,
    #[serde(default)]
    allow_mod_distribution: Option<bool>,
    #[serde(default)]
    latest_files: Vec<CurseFile>,
}

impl CurseMod {
    fn candidate(&self, file: Option<&CurseFile>, confidence: MatchConfidence) -> ProviderCandidate {
        let mut candidate = ProviderCandidate::new(
            ProviderKind::CurseForge,
            self.id.to_string(),
            self.name.clone(),
            confidence,
        )
        .with_distribution(Distribution::from_flag(self.allow_mod_distribution));

        if let Some(file) = file {
            candidate = candidate
                .with_file_id(file.id.to_string())
                .with_version(file.display_name.clone())
                .with_download_url(file.download_url.clone());
            if file.download_url.is_none() {
                candidate = candidate.with_distribution(Distribution::Denied);
            }
        }
        candidate
    }
}

/// Client for the CurseForge Core API.
pub struct CurseForgeProvider {
    fetcher: Arc<CachedFetcher>,
    base_url: String,
    api_key: Option<String>,
    missing_key_logged: AtomicBool,
}

impl CurseForgeProvider {
    pub fn new(fetcher: Arc<CachedFetcher>, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: trim_base(base_url),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            missing_key_logged: AtomicBool::new(false),
        }
    }

    /// The API key, logging once when it is absent.
    fn key(&self) -> Option<&str> {
        if self.api_key.is_none() && !self.missing_key_logged.swap(true, Ordering::SeqCst) {
            warn!("No CurseForge API key configured; CurseForge lookups are skipped");
        }
        self.api_key.as_deref()
    }

    fn with_key(&self, request: FetchRequest, key: &str) -> FetchRequest {
        request
            .header("Accept", "application/json")
            .header("x-api-key", key)
    }

    fn search_request(&self, key: &str) -> FetchRequest {
        self.with_key(
            FetchRequest::get(format!("{}/v1/mods/search", self.base_url)).query(
                "gameId",
                ProviderUrls::CURSEFORGE_MINECRAFT_GAME_ID.to_string(),
            ),
            key,
        )
    }

    async fn get_mod(&self, key: &str, mod_id: &str) -> Result<Option<CurseMod>> {
        let request = self.with_key(
            FetchRequest::get(format!("{}/v1/mods/{}", self.base_url, mod_id)),
            key,
        );
        let envelope: Option<Envelope<CurseMod>> =
            fetch_json(&self.fetcher, ProviderKind::CurseForge, &request).await?;
        Ok(envelope.map(|e| e.data))
    }

    async fn search(&self, request: FetchRequest) -> Result<Vec<CurseMod>> {
        let envelope: Option<Envelope<Vec<CurseMod>>> =
            fetch_json(&self.fetcher, ProviderKind::CurseForge, &request).await?;
        Ok(envelope.map(|e| e.data).unwrap_or_default())
    }
}

#[async_trait]
impl Provider for CurseForgeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CurseForge
    }

    async fn lookup_by_hash(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        let Some(fingerprint) = file
            .hash(HashAlgorithm::Murmur2)
            .and_then(|h| h.parse::<u32>().ok())
        else {
            return Ok(None);
        };
        let Some(key) = self.key() else {
            return Ok(None);
        };

        let request = self.with_key(
            FetchRequest::post_query(
                format!("{}/v1/fingerprints", self.base_url),
                json!({ "fingerprints": [fingerprint] }),
            ),
            key,
        );
        let envelope: Option<Envelope<FingerprintMatches>> =
            fetch_json(&self.fetcher, ProviderKind::CurseForge, &request).await?;
        let Some(found) = envelope.and_then(|e| e.data.exact_matches.into_iter().next()) else {
            return Ok(None);
        };

        debug!(
            "CurseForge fingerprint {} matched mod {} file {}",
            fingerprint, found.id, found.file.id
        );
        let mod_info = match self.get_mod(key, &found.id.to_string()).await? {
            Some(mod_info) => mod_info,
            None => CurseMod {
                id: found.id,
                name: found.file.display_name.clone(),
                allow_mod_distribution: None,
                latest_files: Vec::new(),
            },
        };
        Ok(Some(
            mod_info.candidate(Some(&found.file), MatchConfidence::Exact),
        ))
    }

    async fn lookup_by_id(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        let Some(slug) = file.embedded_id.as_deref() else {
            return Ok(None);
        };
        let Some(key) = self.key() else {
            return Ok(None);
        };

        let file_name = file.file_name();
        let mods = self.search(self.search_request(key).query("slug", slug)).await?;
        Ok(mods.iter().find_map(|m| {
            m.latest_files
                .iter()
                .find(|f| f.file_name == file_name)
                .map(|f| m.candidate(Some(f), MatchConfidence::Accurate))
        }))
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<ProviderCandidate>> {
        let Some(key) = self.key() else {
            return Ok(Vec::new());
        };

        let request = self
            .search_request(key)
            .query("searchFilter", name)
            .query("sortField", "2")
            .query("sortOrder", "desc")
            .query("pageSize", ProviderUrls::SEARCH_LIMIT.to_string());
        let mods = self.search(request).await?;
        Ok(mods
            .iter()
            .map(|m| m.candidate(m.latest_files.first(), MatchConfidence::Loose))
            .collect())
    }

    async fn check_distribution_permission(
        &self,
        candidate: &ProviderCandidate,
    ) -> Result<Distribution> {
        if candidate.distribution_allowed != Distribution::Unknown {
            return Ok(candidate.distribution_allowed);
        }
        let Some(key) = self.key() else {
            return Ok(Distribution::Unknown);
        };
        let mod_info = self.get_mod(key, &candidate.external_id).await?;
        Ok(Distribution::from_flag(
            mod_info.and_then(|m| m.allow_mod_distribution),
        ))
    }
}
