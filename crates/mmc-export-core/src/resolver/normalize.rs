//! Search-name normalization for loose matching.

use crate::models::LocalFile;
use regex::Regex;
use std::sync::LazyLock;

/// Runs of whitespace and common file-name separators.
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-_.+]+").unwrap());

/// Loader names that commonly appear in jar file names.
const LOADER_TOKENS: &[&str] = &["fabric", "quilt", "forge", "neoforge", "mc"];

/// Case-fold a display name and collapse separators to single spaces.
///
/// ```
/// use mmc_export_core::resolver::normalize_name;
///
/// assert_eq!(normalize_name("Just_Enough--Items"), "just enough items");
/// ```
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    SEPARATORS.replace_all(&lowered, " ").trim().to_string()
}

/// Name sent to provider search for `file`.
///
/// A name declared inside the jar is only normalized. When the display name
/// is just the file stem, version and loader tokens are dropped as well, so
/// `sodium-fabric-mc1.20.1-0.5.3.jar` searches for `sodium`.
pub fn search_name(file: &LocalFile) -> String {
    let stem = file
        .path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    if file.display_name == stem {
        stem_search_name(&file.display_name)
    } else {
        normalize_name(&file.display_name)
    }
}

/// Normalized file stem without version or loader tokens. Falls back to the
/// plain normalized stem if nothing is left.
fn stem_search_name(stem: &str) -> String {
    let normalized = normalize_name(stem);
    let kept: Vec<&str> = normalized
        .split(' ')
        .filter(|token| !token.chars().any(|c| c.is_ascii_digit()))
        .filter(|token| !LOADER_TOKENS.contains(token))
        .collect();

    if kept.is_empty() {
        normalized
    } else {
        kept.join(" ")
    }
}
