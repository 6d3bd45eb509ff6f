//! MultiMC / Prism Launcher instance reader.
//!
//! Instance layout:
//! - `instance.cfg`: INI-style `key=value`, `name` and `notes` are used
//! - `mmc-pack.json`: component list with game and loader versions
//! - `.minecraft/` (or `minecraft/`): the game directory
//!
//! Jars in `<game>/mods` become local files in file-name order. Every other
//! regular file in the game directory, outside a few runtime directories,
//! becomes an override.

use crate::hashing::compute_file_digests;
use crate::models::{LoaderType, LocalFile, ManifestMetadata, PackManifest};
use crate::{ExportError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Candidate game directory names, in lookup order.
const GAME_DIRS: &[&str] = &[".minecraft", "minecraft"];

/// Game directory entries never exported as overrides.
const EXCLUDED_DIRS: &[&str] = &["mods", "logs", "crash-reports", "saves", "screenshots"];

const MODS_DIR: &str = "mods";

/// Source of the resolver's input.
pub trait ManifestReader: Send + Sync {
    fn read(&self, input: &Path) -> Result<PackManifest>;
}

#[derive(Debug, Deserialize)]
struct MmcPack {
    #[serde(default)]
    components: Vec<MmcComponent>,
}

#[derive(Debug, Deserialize)]
struct MmcComponent {
    uid: String,
    #[serde(default)]
    version: Option<String>,
}

/// Identity a jar declares in its loader metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EmbeddedInfo {
    id: Option<String>,
    name: Option<String>,
    source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FabricModJson {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    contact: Contact,
}

#[derive(Debug, Default, Deserialize)]
struct Contact {
    sources: Option<String>,
    homepage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuiltModJson {
    quilt_loader: QuiltLoader,
}

#[derive(Debug, Deserialize)]
struct QuiltLoader {
    id: Option<String>,
    #[serde(default)]
    metadata: QuiltMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct QuiltMetadata {
    name: Option<String>,
    #[serde(default)]
    contact: Contact,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgeModsToml {
    #[serde(rename = "issueTrackerURL")]
    issue_tracker_url: Option<String>,
    #[serde(default)]
    mods: Vec<ForgeMod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgeMod {
    mod_id: Option<String>,
    display_name: Option<String>,
    #[serde(rename = "displayURL")]
    display_url: Option<String>,
}

/// Reader for MultiMC-format instance directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiMcReader;

impl ManifestReader for MultiMcReader {
    fn read(&self, input: &Path) -> Result<PackManifest> {
        if !input.is_dir() {
            return Err(manifest_error(input, "not an instance directory"));
        }

        let mut metadata = read_mmc_pack(&input.join("mmc-pack.json"))?;
        let cfg = read_instance_cfg(&input.join("instance.cfg"));
        metadata.name = cfg.get("name").cloned();
        metadata.description = cfg.get("notes").cloned();

        let Some(game_dir) = GAME_DIRS
            .iter()
            .map(|name| input.join(name))
            .find(|dir| dir.is_dir())
        else {
            warn!("{} has no game directory", input.display());
            return Ok(PackManifest {
                metadata,
                ..Default::default()
            });
        };

        let files = read_mods(&game_dir)?;
        let overrides = read_overrides(&game_dir)?;
        debug!(
            "Read {} mods and {} overrides from {}",
            files.len(),
            overrides.len(),
            input.display()
        );

        Ok(PackManifest {
            metadata,
            files,
            overrides,
        })
    }
}

fn manifest_error(path: &Path, message: impl Into<String>) -> ExportError {
    ExportError::Manifest {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn read_mmc_pack(path: &Path) -> Result<ManifestMetadata> {
    let contents = std::fs::read_to_string(path).map_err(|e| manifest_error(path, e.to_string()))?;
    let pack: MmcPack =
        serde_json::from_str(&contents).map_err(|e| manifest_error(path, e.to_string()))?;

    let mut metadata = ManifestMetadata::default();
    for component in pack.components {
        if component.uid == "net.minecraft" {
            metadata.game_version = component.version;
        } else if let Some(loader) = LoaderType::from_component_uid(&component.uid) {
            metadata.loader_type = Some(loader);
            metadata.loader_version = component.version;
        }
    }
    Ok(metadata)
}

/// Parse `instance.cfg`. A missing or unreadable file yields no keys.
fn read_instance_cfg(path: &Path) -> BTreeMap<String, String> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        debug!("No readable instance.cfg at {}", path.display());
        return BTreeMap::new();
    };
    contents
        .lines()
        .filter(|line| !line.starts_with('[') && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(_, value)| !value.is_empty())
        .collect()
}

fn read_mods(game_dir: &Path) -> Result<Vec<LocalFile>> {
    let mods_dir = game_dir.join(MODS_DIR);
    if !mods_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut jars: Vec<PathBuf> = std::fs::read_dir(&mods_dir)
        .map_err(|e| manifest_error(&mods_dir, e.to_string()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
        })
        .collect();
    jars.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));

    jars.iter().map(|jar| describe_jar(jar)).collect()
}

fn describe_jar(jar: &Path) -> Result<LocalFile> {
    let digests = compute_file_digests(jar)?;
    let file_name = jar.file_name().unwrap_or_default();
    let mut file = digests.apply(LocalFile::new(
        Path::new(MODS_DIR).join(file_name),
        digests.size_bytes,
    ));

    let info = read_embedded_info(jar);
    if let Some(name) = info.name {
        file = file.with_display_name(name);
    }
    if let Some(id) = info.id {
        file = file.with_embedded_id(id);
    }
    if let Some(url) = info.source_url {
        file = file.with_source_url(url);
    }
    Ok(file)
}

/// Loader metadata from inside a jar. Unreadable jars yield nothing.
fn read_embedded_info(jar: &Path) -> EmbeddedInfo {
    let archive = std::fs::File::open(jar)
        .map_err(|e| e.to_string())
        .and_then(|f| zip::ZipArchive::new(f).map_err(|e| e.to_string()));
    let mut archive = match archive {
        Ok(archive) => archive,
        Err(e) => {
            debug!("Cannot open {} as a jar: {}", jar.display(), e);
            return EmbeddedInfo::default();
        }
    };

    let mut read_entry = |name: &str| -> Option<String> {
        let mut entry = archive.by_name(name).ok()?;
        let mut contents = String::new();
        entry.read_to_string(&mut contents).ok()?;
        Some(contents)
    };

    if let Some(info) = read_entry("fabric.mod.json").and_then(|c| parse_fabric(&c)) {
        return info;
    }
    if let Some(info) = read_entry("quilt.mod.json").and_then(|c| parse_quilt(&c)) {
        return info;
    }
    if let Some(info) = read_entry("META-INF/mods.toml").and_then(|c| parse_forge(&c)) {
        return info;
    }
    if let Some(info) = read_entry("META-INF/neoforge.mods.toml").and_then(|c| parse_forge(&c)) {
        return info;
    }
    EmbeddedInfo::default()
}

fn parse_fabric(contents: &str) -> Option<EmbeddedInfo> {
    let parsed: FabricModJson = serde_json::from_str(contents).ok()?;
    Some(EmbeddedInfo {
        id: parsed.id,
        name: parsed.name,
        source_url: parsed.contact.sources.or(parsed.contact.homepage),
    })
}

fn parse_quilt(contents: &str) -> Option<EmbeddedInfo> {
    let parsed: QuiltModJson = serde_json::from_str(contents).ok()?;
    let loader = parsed.quilt_loader;
    Some(EmbeddedInfo {
        id: loader.id,
        name: loader.metadata.name,
        source_url: loader
            .metadata
            .contact
            .sources
            .or(loader.metadata.contact.homepage),
    })
}

fn parse_forge(contents: &str) -> Option<EmbeddedInfo> {
    let parsed: ForgeModsToml = toml::from_str(contents).ok()?;
    let first = parsed.mods.into_iter().next()?;
    Some(EmbeddedInfo {
        id: first.mod_id,
        name: first.display_name,
        source_url: first.display_url.or(parsed.issue_tracker_url),
    })
}

fn read_overrides(game_dir: &Path) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
    let mut overrides = BTreeMap::new();

    let walker = WalkDir::new(game_dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() != 1
                || !entry.file_type().is_dir()
                || !EXCLUDED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
        });

    for entry in walker {
        let entry = entry.map_err(|e| manifest_error(game_dir, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(game_dir)
            .map_err(|e| manifest_error(entry.path(), e.to_string()))?
            .to_path_buf();
        let bytes =
            std::fs::read(entry.path()).map_err(|e| ExportError::io_with_path(e, entry.path()))?;
        overrides.insert(relative, bytes);
    }
    Ok(overrides)
}
