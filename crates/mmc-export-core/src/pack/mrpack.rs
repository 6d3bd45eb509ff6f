//! Modrinth `.mrpack` writer.
//!
//! The archive holds `modrinth.index.json` and an `overrides/` tree. A
//! resource goes into the index when it resolved to a download URL and the
//! local file has both SHA-1 and SHA-512 digests. Anything else is left out
//! with a warning.

use super::writer::{is_contained, FormatWriter};
use crate::atomic::write_atomic;
use crate::config::AppConfig;
use crate::models::{HashAlgorithm, IntermediatePack, LoaderType, ResolvedResource};
use crate::{ExportError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const FORMAT_VERSION: u32 = 1;
const GAME: &str = "minecraft";
const DEFAULT_VERSION_ID: &str = "1.0.0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModrinthIndex<'a> {
    format_version: u32,
    game: &'static str,
    version_id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    files: Vec<IndexFile<'a>>,
    dependencies: BTreeMap<&'static str, &'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexFile<'a> {
    path: String,
    hashes: BTreeMap<&'static str, &'a str>,
    downloads: Vec<&'a str>,
    file_size: u64,
}

/// Writes `<pack name>.mrpack`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModrinthWriter;

impl FormatWriter for ModrinthWriter {
    fn name(&self) -> &'static str {
        "modrinth"
    }

    fn write(&self, pack: &IntermediatePack, output_dir: &Path) -> Result<PathBuf> {
        let target = output_dir.join(format!(
            "{}.{}",
            archive_stem(&pack.metadata.name),
            AppConfig::MODRINTH_PACK_EXTENSION
        ));

        let files: Vec<IndexFile> = pack
            .resources
            .iter()
            .filter_map(|resource| {
                let entry = index_entry(resource);
                if entry.is_none() {
                    warn!(
                        "{} left out of {}: no download URL or digests",
                        resource.local_file.path.display(),
                        target.display()
                    );
                }
                entry
            })
            .collect();

        let metadata = &pack.metadata;
        let mut dependencies = BTreeMap::new();
        dependencies.insert(GAME, metadata.game_version.as_str());
        if let (Some(loader), Some(version)) = (metadata.loader_type, &metadata.loader_version) {
            dependencies.insert(dependency_key(loader), version.as_str());
        }

        let index = ModrinthIndex {
            format_version: FORMAT_VERSION,
            game: GAME,
            version_id: metadata.version.as_deref().unwrap_or(DEFAULT_VERSION_ID),
            name: &metadata.name,
            summary: metadata.description.as_deref(),
            files,
            dependencies,
        };
        debug!("Modrinth index lists {} files", index.files.len());

        let archive = build_archive(&index, &pack.overrides, &target)?;
        write_atomic(&target, &archive)?;
        info!("Wrote {}", target.display());
        Ok(target)
    }
}

fn index_entry(resource: &ResolvedResource) -> Option<IndexFile<'_>> {
    let file = &resource.local_file;
    let url = resource.winning_candidate.as_ref()?.download_url.as_deref()?;
    if !is_contained(&file.path) {
        return None;
    }

    let mut hashes = BTreeMap::new();
    for algorithm in [HashAlgorithm::Sha1, HashAlgorithm::Sha512] {
        hashes.insert(algorithm.as_str(), file.hash(algorithm)?);
    }

    Some(IndexFile {
        path: slash_path(&file.path),
        hashes,
        downloads: vec![url],
        file_size: file.size_bytes,
    })
}

fn build_archive(
    index: &ModrinthIndex<'_>,
    overrides: &BTreeMap<PathBuf, Vec<u8>>,
    target: &Path,
) -> Result<Vec<u8>> {
    let zip_error = |e: zip::result::ZipError| ExportError::Archive {
        path: target.to_path_buf(),
        message: e.to_string(),
    };
    let options = SimpleFileOptions::default();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    zip.start_file(AppConfig::MODRINTH_INDEX_FILE_NAME, options)
        .map_err(zip_error)?;
    zip.write_all(&serde_json::to_vec_pretty(index)?)?;

    for (relative, bytes) in overrides {
        if !is_contained(relative) {
            return Err(ExportError::Manifest {
                path: relative.clone(),
                message: "override path escapes the game directory".to_string(),
            });
        }
        let name = format!("{}/{}", AppConfig::OVERRIDES_DIR_NAME, slash_path(relative));
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish().map_err(zip_error)?.into_inner())
}

fn dependency_key(loader: LoaderType) -> &'static str {
    match loader {
        LoaderType::Fabric => "fabric-loader",
        LoaderType::Quilt => "quilt-loader",
        LoaderType::Forge => "forge",
        LoaderType::NeoForge => "neoforge",
    }
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// File-system safe archive name.
fn archive_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if cleaned.is_empty() {
        AppConfig::APP_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
