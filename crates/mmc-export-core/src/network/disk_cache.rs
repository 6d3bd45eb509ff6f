//! Persistent response store keyed by request fingerprint.
//!
//! Each entry is a small JSON document under `<dir>/<fp[0..2]>/<fp>.json`,
//! with the response body stored as base64. Writes go to a temp file in the same directory and are renamed into place,
//! so readers never observe a partially written entry.

use super::request::FetchResponse;
use crate::atomic::write_atomic;
use crate::{ExportError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// One stored response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: String,
    pub status: u16,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(fingerprint: &str, response: &FetchResponse) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            status: response.status,
            body: response.body.clone(),
            stored_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => Utc::now() - self.stored_at > ttl,
            Err(_) => false,
        }
    }

    pub fn to_response(&self) -> FetchResponse {
        FetchResponse {
            status: self.status,
            body: self.body.clone(),
        }
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Filesystem-backed cache tier.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    ttl: Option<Duration>,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        Self {
            root: root.into(),
            ttl,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        let shard = fingerprint.get(..2).unwrap_or("00");
        self.root.join(shard).join(format!("{}.json", fingerprint))
    }

    /// Read an entry.
    ///
    /// Missing and expired entries are `Ok(None)`. An entry that cannot be
    /// parsed, or that belongs to another fingerprint, is `CacheCorruption`.
    pub fn read(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(fingerprint);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ExportError::CacheCorruption {
                    fingerprint: fingerprint.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let entry: CacheEntry =
            serde_json::from_str(&contents).map_err(|e| ExportError::CacheCorruption {
                fingerprint: fingerprint.to_string(),
                message: e.to_string(),
            })?;

        if entry.fingerprint != fingerprint {
            return Err(ExportError::CacheCorruption {
                fingerprint: fingerprint.to_string(),
                message: format!("entry belongs to {}", entry.fingerprint),
            });
        }

        if entry.is_expired(self.ttl) {
            debug!("Disk cache entry {} expired", fingerprint);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Read an entry, downgrading corruption to a miss.
    pub fn lookup(&self, fingerprint: &str) -> Option<CacheEntry> {
        match self.read(fingerprint) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable cache entry: {}", e);
                None
            }
        }
    }

    /// Store an entry atomically.
    pub fn write(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(&entry.fingerprint);
        let serialized = serde_json::to_vec(entry)?;
        write_atomic(&path, &serialized)?;
        debug!("Stored cache entry {}", entry.fingerprint);
        Ok(())
    }
}
