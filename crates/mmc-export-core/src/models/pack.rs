//! Pack-level types: manifest input shape and the intermediate representation.

use super::{LocalFile, ProviderCandidate};
use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Mod loader a pack runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Fabric,
    Quilt,
    Forge,
    NeoForge,
}

impl LoaderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderType::Fabric => "fabric",
            LoaderType::Quilt => "quilt",
            LoaderType::Forge => "forge",
            LoaderType::NeoForge => "neoforge",
        }
    }

    /// Map a MultiMC component uid onto a loader.
    pub fn from_component_uid(uid: &str) -> Option<Self> {
        match uid {
            "net.fabricmc.fabric-loader" => Some(LoaderType::Fabric),
            "org.quiltmc.quilt-loader" => Some(LoaderType::Quilt),
            "net.minecraftforge" => Some(LoaderType::Forge),
            "net.neoforged" => Some(LoaderType::NeoForge),
            _ => None,
        }
    }
}

impl FromStr for LoaderType {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fabric" => Ok(LoaderType::Fabric),
            "quilt" => Ok(LoaderType::Quilt),
            "forge" => Ok(LoaderType::Forge),
            "neoforge" => Ok(LoaderType::NeoForge),
            other => Err(ExportError::config(format!("unknown loader type '{}'", other))),
        }
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pack metadata as read from the source manifest. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub loader_type: Option<LoaderType>,
    pub loader_version: Option<String>,
    pub game_version: Option<String>,
}

/// Everything the resolver consumes from the source pack.
#[derive(Debug, Clone, Default)]
pub struct PackManifest {
    pub metadata: ManifestMetadata,
    /// Local files in manifest order.
    pub files: Vec<LocalFile>,
    /// Non-mod files copied through verbatim, keyed by relative path.
    pub overrides: BTreeMap<PathBuf, Vec<u8>>,
}

/// Validated pack metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackMetadata {
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    /// `None` for vanilla packs.
    pub loader_type: Option<LoaderType>,
    pub loader_version: Option<String>,
    pub game_version: String,
}

/// Outcome of resolving one local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedResource {
    pub local_file: LocalFile,
    pub winning_candidate: Option<ProviderCandidate>,
}

impl ResolvedResource {
    pub fn resolved(local_file: LocalFile, candidate: ProviderCandidate) -> Self {
        Self {
            local_file,
            winning_candidate: Some(candidate),
        }
    }

    pub fn unresolved(local_file: LocalFile) -> Self {
        Self {
            local_file,
            winning_candidate: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.winning_candidate.is_some()
    }
}

/// Provider-agnostic pack model consumed by every format writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntermediatePack {
    pub metadata: PackMetadata,
    /// Resources in manifest order.
    pub resources: Vec<ResolvedResource>,
    /// Override file contents; writers decide how to emit them.
    #[serde(skip)]
    pub overrides: BTreeMap<PathBuf, Vec<u8>>,
}

impl IntermediatePack {
    pub fn resolved_count(&self) -> usize {
        self.resources.iter().filter(|r| r.is_resolved()).count()
    }

    /// Find a resource by relative path, falling back to bare file name.
    pub fn resource_mut(&mut self, key: &str) -> Option<&mut ResolvedResource> {
        let by_path = self
            .resources
            .iter()
            .position(|r| r.local_file.path.to_string_lossy().replace('\\', "/") == key);
        let index = by_path.or_else(|| {
            self.resources
                .iter()
                .position(|r| r.local_file.file_name() == key)
        })?;
        self.resources.get_mut(index)
    }
}
