//! Local file descriptors produced by the manifest reader.

use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Digest algorithms a local file can be identified by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
    /// CurseForge fingerprint (MurmurHash2 over whitespace-stripped bytes).
    Murmur2,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Murmur2 => "murmur2",
        }
    }

    /// Expected hex length for hex-encoded digests.
    fn hex_len(&self) -> Option<usize> {
        match self {
            HashAlgorithm::Sha1 => Some(40),
            HashAlgorithm::Sha256 => Some(64),
            HashAlgorithm::Sha512 => Some(128),
            HashAlgorithm::Murmur2 => None,
        }
    }

    /// Normalize a digest, rejecting malformed values.
    ///
    /// Hex digests are lowercased; murmur2 fingerprints must be a decimal u32.
    pub fn normalize_digest(&self, file: &str, digest: &str) -> Result<String> {
        let trimmed = digest.trim();
        let invalid = || ExportError::InvalidHash {
            file: file.to_string(),
            algorithm: self.as_str().to_string(),
            digest: digest.to_string(),
        };

        match self.hex_len() {
            Some(len) => {
                if trimmed.len() != len || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                Ok(trimmed.to_ascii_lowercase())
            }
            None => trimmed
                .parse::<u32>()
                .map(|value| value.to_string())
                .map_err(|_| invalid()),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mod or resource file found in the source pack.
///
/// Identity for matching is the hash set. Descriptors are never mutated after
/// the manifest reader produces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    /// Path relative to the game directory (e.g. `mods/sodium.jar`).
    pub path: PathBuf,
    pub display_name: String,
    #[serde(default)]
    pub content_hashes: BTreeMap<HashAlgorithm, String>,
    pub size_bytes: u64,
    /// Mod id or slug declared inside the file, if any.
    #[serde(default)]
    pub embedded_id: Option<String>,
    /// Project source link declared inside the file, if any.
    #[serde(default)]
    pub source_url: Option<String>,
}

impl LocalFile {
    /// Create a descriptor with the display name taken from the file stem.
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let display_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            display_name,
            content_hashes: BTreeMap::new(),
            size_bytes,
            embedded_id: None,
            source_url: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Attach a digest as-is. Validation happens in [`LocalFile::validate`].
    pub fn with_hash(mut self, algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        self.content_hashes.insert(algorithm, digest.into());
        self
    }

    pub fn with_embedded_id(mut self, id: impl Into<String>) -> Self {
        self.embedded_id = Some(id.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Final path component, used to match provider file listings.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.content_hashes.get(&algorithm).map(String::as_str)
    }

    pub fn has_hashes(&self) -> bool {
        !self.content_hashes.is_empty()
    }

    /// Check every digest and return a copy with normalized values.
    pub fn validate(&self) -> Result<LocalFile> {
        let label = self.path.display().to_string();
        let mut normalized = BTreeMap::new();
        for (algorithm, digest) in &self.content_hashes {
            normalized.insert(*algorithm, algorithm.normalize_digest(&label, digest)?);
        }
        Ok(LocalFile {
            content_hashes: normalized,
            ..self.clone()
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
