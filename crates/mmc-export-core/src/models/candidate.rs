//! Provider-native candidate records.

use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Online content providers, declared in resolution priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    GitHub,
    CurseForge,
    Modrinth,
}

impl ProviderKind {
    /// Fixed search order used by the resolver.
    pub const PRIORITY: [ProviderKind; 3] = [
        ProviderKind::GitHub,
        ProviderKind::CurseForge,
        ProviderKind::Modrinth,
    ];

    /// Position in [`ProviderKind::PRIORITY`].
    pub fn priority(self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|&kind| kind == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GitHub",
            ProviderKind::CurseForge => "CurseForge",
            ProviderKind::Modrinth => "Modrinth",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "curseforge" => Ok(ProviderKind::CurseForge),
            "modrinth" => Ok(ProviderKind::Modrinth),
            other => Err(ExportError::config(format!(
                "unknown provider '{}', expected GitHub, CurseForge or Modrinth",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the provider allows third-party redistribution of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Allowed,
    Denied,
    #[default]
    Unknown,
}

impl Distribution {
    /// Map an optional provider flag onto the tri-state.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Distribution::Allowed,
            Some(false) => Distribution::Denied,
            None => Distribution::Unknown,
        }
    }
}

/// Reliability tier of a match, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    /// Content hash match.
    Exact,
    /// Project id/slug match.
    Accurate,
    /// Name search match.
    Loose,
}

impl MatchConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchConfidence::Exact => "exact",
            MatchConfidence::Accurate => "accurate",
            MatchConfidence::Loose => "loose",
        }
    }
}

impl std::fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file a provider claims to serve.
///
/// Produced fresh per lookup and only compared, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCandidate {
    pub provider: ProviderKind,
    /// Project id (CurseForge mod id, Modrinth project id, GitHub `owner/repo`).
    pub external_id: String,
    /// Provider file/version id, when the provider has one.
    #[serde(default)]
    pub file_id: Option<String>,
    pub canonical_name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    pub distribution_allowed: Distribution,
    pub match_confidence: MatchConfidence,
}

impl ProviderCandidate {
    pub fn new(
        provider: ProviderKind,
        external_id: impl Into<String>,
        canonical_name: impl Into<String>,
        match_confidence: MatchConfidence,
    ) -> Self {
        Self {
            provider,
            external_id: external_id.into(),
            file_id: None,
            canonical_name: canonical_name.into(),
            version: None,
            download_url: None,
            distribution_allowed: Distribution::Unknown,
            match_confidence,
        }
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.download_url = url;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution_allowed = distribution;
        self
    }
}
