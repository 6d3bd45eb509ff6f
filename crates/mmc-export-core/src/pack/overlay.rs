//! User-supplied override document.
//!
//! TOML when the file ends in `.toml`, JSON otherwise:
//!
//! ```toml
//! name = "My Pack"
//! version = "1.2.0"
//!
//! [resources."mods/custom.jar"]
//! provider = "Modrinth"
//! external_id = "AANobbMI"
//! download_url = "https://cdn.modrinth.com/..."
//! ```
//!
//! Unknown keys are reported with a warning and otherwise ignored.

use crate::models::{
    Distribution, IntermediatePack, LoaderType, ManifestMetadata, MatchConfidence,
    ProviderCandidate, ProviderKind,
};
use crate::{ExportError, Result};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Per-resource corrections, keyed by path or file name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceOverride {
    pub provider: Option<String>,
    #[serde(alias = "externalId")]
    pub external_id: Option<String>,
    #[serde(alias = "fileId")]
    pub file_id: Option<String>,
    #[serde(alias = "canonicalName")]
    pub canonical_name: Option<String>,
    pub version: Option<String>,
    #[serde(alias = "downloadUrl")]
    pub download_url: Option<String>,
    pub distribution: Option<Distribution>,
    #[serde(flatten)]
    unknown: BTreeMap<String, IgnoredAny>,
}

/// Parsed override document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverlay {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "gameVersion")]
    pub game_version: Option<String>,
    #[serde(alias = "loaderType")]
    pub loader_type: Option<String>,
    #[serde(alias = "loaderVersion")]
    pub loader_version: Option<String>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceOverride>,
    #[serde(flatten)]
    unknown: BTreeMap<String, IgnoredAny>,
}

impl ConfigOverlay {
    /// Load an override file. Unreadable or malformed files are fatal
    /// configuration errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExportError::config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let overlay = if is_toml {
            Self::from_toml(&contents)
        } else {
            Self::from_json(&contents)
        }
        .map_err(|e| ExportError::config(format!("Invalid config {}: {}", path.display(), e)))?;
        debug!("Loaded config overlay from {}", path.display());
        Ok(overlay)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let overlay: Self = toml::from_str(contents)?;
        overlay.validate()?;
        Ok(overlay)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let overlay: Self = serde_json::from_str(contents)?;
        overlay.validate()?;
        Ok(overlay)
    }

    fn validate(&self) -> Result<()> {
        self.loader()?;
        for (key, resource) in &self.resources {
            if let Some(provider) = &resource.provider {
                provider.parse::<ProviderKind>().map_err(|e| {
                    ExportError::config(format!("resources.\"{}\": {}", key, e))
                })?;
            }
        }
        Ok(())
    }

    fn loader(&self) -> Result<Option<LoaderType>> {
        self.loader_type.as_deref().map(str::parse).transpose()
    }

    /// Warn about every key this document does not understand.
    pub fn warn_unknown_keys(&self) {
        for key in self.unknown.keys() {
            warn!("Ignoring unknown config key '{}'", key);
        }
        for (path, resource) in &self.resources {
            for key in resource.unknown.keys() {
                warn!("Ignoring unknown key '{}' in resources.\"{}\"", key, path);
            }
        }
    }

    /// Fill or replace manifest metadata before validation.
    pub fn merge_metadata(&self, mut metadata: ManifestMetadata) -> ManifestMetadata {
        let set = |target: &mut Option<String>, value: &Option<String>| {
            if value.is_some() {
                target.clone_from(value);
            }
        };
        set(&mut metadata.name, &self.name);
        set(&mut metadata.version, &self.version);
        set(&mut metadata.author, &self.author);
        set(&mut metadata.description, &self.description);
        set(&mut metadata.game_version, &self.game_version);
        set(&mut metadata.loader_version, &self.loader_version);
        if let Ok(Some(loader)) = self.loader() {
            metadata.loader_type = Some(loader);
        }
        metadata
    }

    /// Apply metadata and resource overrides to a built pack.
    ///
    /// Returns the number of resource overrides applied.
    pub fn apply(&self, pack: &mut IntermediatePack) -> usize {
        self.warn_unknown_keys();

        let meta = &mut pack.metadata;
        if let Some(name) = &self.name {
            meta.name.clone_from(name);
        }
        if let Some(game_version) = &self.game_version {
            meta.game_version.clone_from(game_version);
        }
        if self.version.is_some() {
            meta.version.clone_from(&self.version);
        }
        if self.author.is_some() {
            meta.author.clone_from(&self.author);
        }
        if self.description.is_some() {
            meta.description.clone_from(&self.description);
        }
        if self.loader_version.is_some() {
            meta.loader_version.clone_from(&self.loader_version);
        }
        if let Ok(Some(loader)) = self.loader() {
            meta.loader_type = Some(loader);
        }

        let mut applied = 0;
        for (key, resource_override) in &self.resources {
            let Some(resource) = pack.resource_mut(key) else {
                warn!("Config override for '{}' matches no pack resource", key);
                continue;
            };

            let updated = match resource.winning_candidate.take() {
                Some(candidate) => Some(resource_override.apply_to(candidate)),
                None => resource_override.create_candidate(),
            };
            if updated.is_none() {
                warn!(
                    "Config override for unresolved '{}' needs provider and external_id",
                    key
                );
            } else {
                applied += 1;
            }
            resource.winning_candidate = updated;
        }
        applied
    }
}

impl ResourceOverride {
    fn provider_kind(&self) -> Option<ProviderKind> {
        self.provider.as_deref().and_then(|p| p.parse().ok())
    }

    fn apply_to(&self, mut candidate: ProviderCandidate) -> ProviderCandidate {
        if let Some(provider) = self.provider_kind() {
            candidate.provider = provider;
        }
        if let Some(external_id) = &self.external_id {
            candidate.external_id.clone_from(external_id);
        }
        if self.file_id.is_some() {
            candidate.file_id.clone_from(&self.file_id);
        }
        if let Some(name) = &self.canonical_name {
            candidate.canonical_name.clone_from(name);
        }
        if self.version.is_some() {
            candidate.version.clone_from(&self.version);
        }
        if self.download_url.is_some() {
            candidate.download_url.clone_from(&self.download_url);
        }
        if let Some(distribution) = self.distribution {
            candidate.distribution_allowed = distribution;
        }
        candidate
    }

    /// A manual candidate for an unresolved resource.
    fn create_candidate(&self) -> Option<ProviderCandidate> {
        let provider = self.provider_kind()?;
        let external_id = self.external_id.clone()?;
        let name = self
            .canonical_name
            .clone()
            .unwrap_or_else(|| external_id.clone());

        let mut candidate =
            ProviderCandidate::new(provider, external_id, name, MatchConfidence::Accurate)
                .with_download_url(self.download_url.clone())
                .with_distribution(self.distribution.unwrap_or_default());
        if let Some(file_id) = &self.file_id {
            candidate = candidate.with_file_id(file_id.clone());
        }
        if let Some(version) = &self.version {
            candidate = candidate.with_version(version.clone());
        }
        Some(candidate)
    }
}
