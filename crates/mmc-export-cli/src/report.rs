//! Human-readable run report.

use mmc_export_core::ExportReport;
use std::fmt::Write;

/// One line per resource, then the summary and the written files.
pub fn render(report: &ExportReport) -> String {
    let mut out = String::new();

    for resource in &report.pack.resources {
        let path = resource.local_file.path.display();
        let _ = match &resource.winning_candidate {
            Some(candidate) => writeln!(
                out,
                "  {} -> {} {} ({})",
                path, candidate.provider, candidate.canonical_name, candidate.match_confidence
            ),
            None => writeln!(out, "  {} -> unresolved", path),
        };
    }

    let _ = writeln!(out, "{}", report.summary);
    if let Some(stats) = report.fetcher_stats {
        let _ = writeln!(
            out,
            "Requests: {} network, {} memory hits, {} disk hits",
            stats.network_calls, stats.memory_hits, stats.disk_hits
        );
    }
    for path in &report.written {
        let _ = writeln!(out, "Wrote {}", path.display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmc_export_core::models::PackMetadata;
    use mmc_export_core::{
        IntermediatePack, LocalFile, MatchConfidence, ProviderCandidate, ProviderKind,
        ResolutionSummary, ResolvedResource,
    };
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_render_lists_each_resource() {
        let resources = vec![
            ResolvedResource::resolved(
                LocalFile::new("mods/sodium.jar", 1),
                ProviderCandidate::new(
                    ProviderKind::Modrinth,
                    "AANobbMI",
                    "Sodium",
                    MatchConfidence::Exact,
                ),
            ),
            ResolvedResource::unresolved(LocalFile::new("mods/custom.jar", 1)),
        ];
        let report = ExportReport {
            summary: ResolutionSummary::from_resources(&resources),
            pack: IntermediatePack {
                metadata: PackMetadata {
                    name: "Pack".into(),
                    version: None,
                    author: None,
                    description: None,
                    loader_type: None,
                    loader_version: None,
                    game_version: "1.20.1".into(),
                },
                resources,
                overrides: BTreeMap::new(),
            },
            written: vec![PathBuf::from("out/intermediate_output.json")],
            fetcher_stats: None,
        };

        let text = render(&report);
        assert!(text.contains("mods/sodium.jar -> Modrinth Sodium (exact)"));
        assert!(text.contains("mods/custom.jar -> unresolved"));
        assert!(text.contains("1/2 resolved"));
        assert!(text.contains("Wrote out/intermediate_output.json"));
    }
}
