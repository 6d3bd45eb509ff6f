//! Format writers.
//!
//! A writer turns an [`IntermediatePack`] into one target format inside an
//! output directory. The intermediate JSON format lives here; the Modrinth
//! `.mrpack` writer is in its own module.

use crate::atomic::{write_atomic, write_json_atomic};
use crate::config::AppConfig;
use super::ModrinthWriter;
use crate::models::{IntermediatePack, PackMetadata, ResolvedResource};
use crate::{ExportError, Result};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Serializes an intermediate pack into one target format.
pub trait FormatWriter: Send + Sync {
    /// Format name as accepted on the command line.
    fn name(&self) -> &'static str;

    /// Write the pack under `output_dir`, returning the primary file written.
    fn write(&self, pack: &IntermediatePack, output_dir: &Path) -> Result<PathBuf>;
}

/// Look up a writer by its format name (case-insensitive).
pub fn writer_for(name: &str) -> Result<Box<dyn FormatWriter>> {
    match name.trim().to_lowercase().as_str() {
        "intermediate" => Ok(Box::new(IntermediateWriter)),
        "modrinth" => Ok(Box::new(ModrinthWriter)),
        other => Err(ExportError::config(format!(
            "unknown export format '{}'",
            other
        ))),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntermediateDocument<'a> {
    metadata: &'a PackMetadata,
    resources: &'a [ResolvedResource],
    overrides: Vec<String>,
}

/// Writes `intermediate_output.json` plus an `overrides/` tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntermediateWriter;

impl FormatWriter for IntermediateWriter {
    fn name(&self) -> &'static str {
        "intermediate"
    }

    fn write(&self, pack: &IntermediatePack, output_dir: &Path) -> Result<PathBuf> {
        let overrides_dir = output_dir.join(AppConfig::OVERRIDES_DIR_NAME);
        let mut listed = Vec::with_capacity(pack.overrides.len());

        for (relative, bytes) in &pack.overrides {
            if !is_contained(relative) {
                return Err(ExportError::Manifest {
                    path: relative.clone(),
                    message: "override path escapes the game directory".to_string(),
                });
            }
            write_atomic(&overrides_dir.join(relative), bytes)?;
            listed.push(relative.to_string_lossy().replace('\\', "/"));
        }
        debug!("Copied {} override files", listed.len());

        let document = IntermediateDocument {
            metadata: &pack.metadata,
            resources: &pack.resources,
            overrides: listed,
        };
        let target = output_dir.join(AppConfig::INTERMEDIATE_FILE_NAME);
        write_json_atomic(&target, &document)?;
        info!("Wrote {}", target.display());
        Ok(target)
    }
}

/// Relative path that stays inside the game directory.
pub(super) fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}
