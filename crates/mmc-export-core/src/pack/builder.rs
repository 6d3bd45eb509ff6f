//! Intermediate model builder.

use crate::models::{IntermediatePack, ManifestMetadata, PackMetadata, ResolvedResource};
use crate::{ExportError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Validate manifest metadata. `name` and `game_version` are required.
pub fn validate_metadata(metadata: ManifestMetadata) -> Result<PackMetadata> {
    let name = required(metadata.name, "name")?;
    let game_version = required(metadata.game_version, "game_version")?;

    Ok(PackMetadata {
        name,
        version: non_empty(metadata.version),
        author: non_empty(metadata.author),
        description: non_empty(metadata.description),
        loader_type: metadata.loader_type,
        loader_version: non_empty(metadata.loader_version),
        game_version,
    })
}

/// Assemble the intermediate pack.
///
/// Resources keep the order they are given in; overrides are copied through.
pub fn build_intermediate(
    metadata: ManifestMetadata,
    resources: Vec<ResolvedResource>,
    overrides: BTreeMap<PathBuf, Vec<u8>>,
) -> Result<IntermediatePack> {
    let metadata = validate_metadata(metadata)?;
    debug!(
        "Building intermediate pack '{}' with {} resources and {} overrides",
        metadata.name,
        resources.len(),
        overrides.len()
    );
    Ok(IntermediatePack {
        metadata,
        resources,
        overrides,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| ExportError::MissingMetadata {
        field: field.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
