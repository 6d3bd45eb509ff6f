//! Centralized configuration for mmc-export.
//!
//! Network constants, provider endpoints and the resolver configuration value
//! that is threaded through every resolution run.

use crate::error::{ExportError, Result};
use crate::models::{MatchConfidence, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "mmc-export";
    pub const USER_AGENT: &'static str = "mmc-export/0.4 (+https://github.com/RozeFound/mmc-export)";
    pub const INTERMEDIATE_FILE_NAME: &'static str = "intermediate_output.json";
    pub const OVERRIDES_DIR_NAME: &'static str = "overrides";
    pub const MODRINTH_INDEX_FILE_NAME: &'static str = "modrinth.index.json";
    pub const MODRINTH_PACK_EXTENSION: &'static str = "mrpack";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);
    /// Pause before a request when the provider reports a low rate budget.
    pub const THROTTLE_DELAY: Duration = Duration::from_millis(500);
}

/// Response cache defaults.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const MEMORY_CAPACITY: u64 = 10_000;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);
    pub const DIR_NAME: &'static str = "mmc-export";
}

/// Public API base URLs and provider constants.
pub struct ProviderUrls;

impl ProviderUrls {
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const CURSEFORGE_API_BASE: &'static str = "https://api.curseforge.com";
    pub const MODRINTH_API_BASE: &'static str = "https://api.modrinth.com";
    /// CurseForge game id for Minecraft.
    pub const CURSEFORGE_MINECRAFT_GAME_ID: u32 = 432;
    pub const GITHUB_RELEASES_PER_PAGE: u32 = 100;
    pub const SEARCH_LIMIT: u32 = 5;
}

/// Base URLs and credentials for the three providers.
///
/// Tests point these at mock servers; the CLI fills credentials from flags or
/// environment variables.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub github: String,
    pub curseforge: String,
    pub modrinth: String,
    pub curseforge_api_key: Option<String>,
    pub github_token: Option<String>,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            github: ProviderUrls::GITHUB_API_BASE.to_string(),
            curseforge: ProviderUrls::CURSEFORGE_API_BASE.to_string(),
            modrinth: ProviderUrls::MODRINTH_API_BASE.to_string(),
            curseforge_api_key: None,
            github_token: None,
        }
    }
}

impl ProviderEndpoints {
    /// Point every provider at the same base URL (used with mock servers).
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            github: base.clone(),
            curseforge: base.clone(),
            modrinth: base,
            curseforge_api_key: None,
            github_token: None,
        }
    }

    pub fn with_curseforge_api_key(mut self, key: impl Into<String>) -> Self {
        self.curseforge_api_key = Some(key.into());
        self
    }

    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(token.into());
        self
    }
}

/// How far the resolver may descend when looking for a match.
///
/// Acts as a global ceiling: `Exact` only allows hash lookups, `Accurate` adds
/// id lookups, `Loose` adds name search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchLevel {
    #[default]
    Exact,
    Accurate,
    Loose,
}

impl SearchLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchLevel::Exact => "exact",
            SearchLevel::Accurate => "accurate",
            SearchLevel::Loose => "loose",
        }
    }

    /// Match steps the resolver may run at this level, strongest first.
    pub fn permitted_steps(&self) -> &'static [MatchConfidence] {
        match self {
            SearchLevel::Exact => &[MatchConfidence::Exact],
            SearchLevel::Accurate => &[MatchConfidence::Exact, MatchConfidence::Accurate],
            SearchLevel::Loose => &[
                MatchConfidence::Exact,
                MatchConfidence::Accurate,
                MatchConfidence::Loose,
            ],
        }
    }

    pub fn permits(&self, confidence: MatchConfidence) -> bool {
        self.permitted_steps().contains(&confidence)
    }
}

impl FromStr for SearchLevel {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(SearchLevel::Exact),
            "accurate" => Ok(SearchLevel::Accurate),
            "loose" => Ok(SearchLevel::Loose),
            other => Err(ExportError::config(format!(
                "unknown search level '{}', expected exact, accurate or loose",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SearchLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration value for a single resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Strictness ceiling.
    pub search_level: SearchLevel,
    /// Providers that are never queried.
    pub excluded_providers: BTreeSet<ProviderKind>,
    /// Accept candidates whose provider denies redistribution.
    pub ignore_forbidden: bool,
}

impl ResolverConfig {
    pub fn new(search_level: SearchLevel) -> Self {
        Self {
            search_level,
            ..Default::default()
        }
    }

    /// Build a config from raw CLI strings.
    ///
    /// Malformed values are fatal configuration errors.
    pub fn from_raw(level: &str, excluded: &[String], ignore_forbidden: bool) -> Result<Self> {
        let search_level = level.parse()?;
        let excluded_providers = excluded
            .iter()
            .map(|name| name.parse::<ProviderKind>())
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self {
            search_level,
            excluded_providers,
            ignore_forbidden,
        })
    }

    pub fn exclude(mut self, provider: ProviderKind) -> Self {
        self.excluded_providers.insert(provider);
        self
    }

    pub fn with_ignore_forbidden(mut self, ignore: bool) -> Self {
        self.ignore_forbidden = ignore;
        self
    }

    pub fn is_excluded(&self, provider: ProviderKind) -> bool {
        self.excluded_providers.contains(&provider)
    }
}

/// Default on-disk location for the response cache.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CacheDefaults::DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_level_parse() {
        assert_eq!("exact".parse::<SearchLevel>().unwrap(), SearchLevel::Exact);
        assert_eq!("Accurate".parse::<SearchLevel>().unwrap(), SearchLevel::Accurate);
        assert_eq!(" LOOSE ".parse::<SearchLevel>().unwrap(), SearchLevel::Loose);

        let err = "fuzzy".parse::<SearchLevel>().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_search_level_ceiling() {
        assert!(SearchLevel::Exact.permits(MatchConfidence::Exact));
        assert!(!SearchLevel::Exact.permits(MatchConfidence::Accurate));
        assert!(!SearchLevel::Accurate.permits(MatchConfidence::Loose));
        assert!(SearchLevel::Loose.permits(MatchConfidence::Loose));
        assert_eq!(SearchLevel::Loose.permitted_steps().len(), 3);
    }

    #[test]
    fn test_resolver_config_from_raw() {
        let config = ResolverConfig::from_raw(
            "accurate",
            &["github".to_string(), "CurseForge".to_string()],
            true,
        )
        .unwrap();
        assert_eq!(config.search_level, SearchLevel::Accurate);
        assert!(config.is_excluded(ProviderKind::GitHub));
        assert!(config.is_excluded(ProviderKind::CurseForge));
        assert!(!config.is_excluded(ProviderKind::Modrinth));
        assert!(config.ignore_forbidden);
    }

    #[test]
    fn test_resolver_config_rejects_unknown_provider() {
        let err = ResolverConfig::from_raw("exact", &["Nexus".to_string()], false).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_endpoints_all_at() {
        let endpoints = ProviderEndpoints::all_at("http://127.0.0.1:9000/");
        assert_eq!(endpoints.github, "http://127.0.0.1:9000");
        assert_eq!(endpoints.modrinth, "http://127.0.0.1:9000");
        assert!(endpoints.curseforge_api_key.is_none());
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(NetworkConfig::REQUEST_TIMEOUT > Duration::ZERO);
        assert!(NetworkConfig::RETRY_MAX_DELAY >= NetworkConfig::RETRY_BASE_DELAY);
    }
}
