//! Error types for mmc-export.
//!
//! Errors fall into three groups that drive how a run reacts:
//! - transient provider errors (retried, then treated as "no match" for that provider)
//! - per-file errors (the file ends unresolved, the batch continues)
//! - fatal errors (configuration, manifest, metadata) that abort the run

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the mmc-export library.
#[derive(Debug, Error)]
pub enum ExportError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{provider} API error: {message}")]
    ProviderApi {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("TOML error: {message}")]
    Toml { message: String },

    // Cache errors
    #[error("Cache entry {fingerprint} is unreadable: {message}")]
    CacheCorruption { fingerprint: String, message: String },

    // Input errors
    #[error("Invalid {algorithm} digest for {file}: {digest}")]
    InvalidHash {
        file: String,
        algorithm: String,
        digest: String,
    },

    #[error("Manifest error at {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Archive error at {path}: {message}")]
    Archive { path: PathBuf, message: String },

    // Fatal run errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required pack metadata field: {field}")]
    MissingMetadata { field: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for mmc-export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Toml {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExportError::Timeout(std::time::Duration::from_secs(0))
        } else {
            ExportError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl ExportError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ExportError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ExportError::Config {
            message: message.into(),
        }
    }

    /// Check if this error should trigger a retry.
    ///
    /// Provider API errors are retryable only for 408 and 5xx statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Network { .. }
            | ExportError::Timeout(_)
            | ExportError::RateLimited { .. } => true,
            ExportError::ProviderApi {
                status_code: Some(code),
                ..
            } => *code == 408 || *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }

    /// Check if this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExportError::Config { .. }
                | ExportError::MissingMetadata { .. }
                | ExportError::Manifest { .. }
        )
    }
}
