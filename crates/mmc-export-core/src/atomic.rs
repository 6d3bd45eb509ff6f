//! Atomic file writes.
//!
//! Data goes to a temp file in the target directory, is synced, and is then
//! renamed over the target. Readers see either the old or the new content.

use crate::{ExportError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Write bytes to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| ExportError::io_with_path(e, parent))?;

    let mut temp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| ExportError::io_with_path(e, parent))?;
    temp.write_all(bytes)
        .map_err(|e| ExportError::io_with_path(e, temp.path()))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| ExportError::io_with_path(e, temp.path()))?;
    temp.persist(path)
        .map_err(|e| ExportError::io_with_path(e.error, path))?;
    Ok(())
}

/// Serialize `data` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(data).map_err(|e| ExportError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;
    write_atomic(path, &serialized)
}
