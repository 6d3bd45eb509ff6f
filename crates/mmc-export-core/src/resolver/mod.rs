//! Resolution policy engine.
//!
//! Each local file is resolved on its own task. Within a file, the permitted
//! match steps run strictly in order (hash, then embedded id, then name
//! search), and each step walks the providers in priority order:
//!
//! ```text
//! exact     GitHub → CurseForge → Modrinth   (lookup_by_hash)
//! accurate  GitHub → CurseForge → Modrinth   (lookup_by_id)
//! loose     GitHub → CurseForge → Modrinth   (search_by_name, top hit only)
//! ```
//!
//! The first acceptable candidate wins. A candidate whose provider denies
//! redistribution is skipped unless `ignore_forbidden` is set, and the walk
//! continues with the next provider and then the next step.

mod normalize;
mod summary;

pub use normalize::{normalize_name, search_name};
pub use summary::ResolutionSummary;

use crate::config::ResolverConfig;
use crate::models::{Distribution, LocalFile, MatchConfidence, ProviderCandidate, ResolvedResource};
use crate::providers::{DynProvider, ProviderRegistry};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves local files against the registered providers.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<ProviderRegistry>,
}

impl Resolver {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve every file concurrently.
    ///
    /// The output has one record per input file, in input order, regardless
    /// of the order in which the per-file tasks complete.
    pub async fn resolve_all(
        &self,
        files: Vec<LocalFile>,
        config: &ResolverConfig,
    ) -> Vec<ResolvedResource> {
        let config = Arc::new(config.clone());
        info!(
            "Resolving {} files via {:?} (search level: {}, excluded: {:?}, ignore forbidden: {})",
            files.len(),
            self.registry.kinds(),
            config.search_level,
            config.excluded_providers,
            config.ignore_forbidden
        );

        let (originals, handles): (Vec<_>, Vec<_>) = files
            .into_iter()
            .map(|file| {
                let resolver = self.clone();
                let config = config.clone();
                let task_file = file.clone();
                let handle =
                    tokio::spawn(async move { resolver.resolve_file(task_file, &config).await });
                (file, handle)
            })
            .unzip();

        let outcomes = futures::future::join_all(handles).await;

        originals
            .into_iter()
            .zip(outcomes)
            .map(|(file, outcome)| match outcome {
                Ok(resource) => resource,
                Err(e) => {
                    warn!("Resolution task for {} failed: {}", file.path.display(), e);
                    ResolvedResource::unresolved(file)
                }
            })
            .collect()
    }

    /// Resolve a single file.
    pub async fn resolve_file(&self, file: LocalFile, config: &ResolverConfig) -> ResolvedResource {
        let file = match file.validate() {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Skipping resolution of {}: {}", file.path.display(), e);
                return ResolvedResource::unresolved(file);
            }
        };

        for &step in config.search_level.permitted_steps() {
            if !step_applies(step, &file) {
                debug!("{}: no input for {} step", file.display_name, step);
                continue;
            }

            for provider in self.eligible(config) {
                let candidates = match self.attempt(provider, step, &file).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        warn!(
                            "{} {} lookup for {} failed, treating as no match: {}",
                            provider.kind(),
                            step,
                            file.display_name,
                            e
                        );
                        continue;
                    }
                };

                for candidate in candidates {
                    if !config.search_level.permits(candidate.match_confidence) {
                        continue;
                    }
                    if let Some(winner) = self.accept(provider, candidate, config).await {
                        info!(
                            "{} resolved via {} ({})",
                            file.display_name, winner.provider, winner.match_confidence
                        );
                        return ResolvedResource::resolved(file, winner);
                    }
                }
            }
        }

        info!("{} unresolved", file.display_name);
        ResolvedResource::unresolved(file)
    }

    fn eligible<'a>(&'a self, config: &'a ResolverConfig) -> impl Iterator<Item = &'a DynProvider> {
        self.registry
            .iter()
            .filter(move |p| !config.is_excluded(p.kind()))
    }

    async fn attempt(
        &self,
        provider: &DynProvider,
        step: MatchConfidence,
        file: &LocalFile,
    ) -> Result<Vec<ProviderCandidate>> {
        match step {
            MatchConfidence::Exact => Ok(provider.lookup_by_hash(file).await?.into_iter().collect()),
            MatchConfidence::Accurate => Ok(provider.lookup_by_id(file).await?.into_iter().collect()),
            MatchConfidence::Loose => {
                let name = search_name(file);
                if name.is_empty() {
                    return Ok(Vec::new());
                }
                // Provider ranking is trusted; only the top hit is considered.
                Ok(provider.search_by_name(&name).await?.into_iter().take(1).collect())
            }
        }
    }

    /// Apply the distribution filter. Returns the candidate with its
    /// distribution resolved, or `None` when it must be discarded.
    async fn accept(
        &self,
        provider: &DynProvider,
        candidate: ProviderCandidate,
        config: &ResolverConfig,
    ) -> Option<ProviderCandidate> {
        let distribution = match provider.check_distribution_permission(&candidate).await {
            Ok(distribution) => distribution,
            Err(e) => {
                warn!(
                    "Distribution check for {} on {} failed: {}",
                    candidate.canonical_name, candidate.provider, e
                );
                candidate.distribution_allowed
            }
        };

        if distribution == Distribution::Denied && !config.ignore_forbidden {
            info!(
                "Discarding {} candidate {}: redistribution denied",
                candidate.provider, candidate.canonical_name
            );
            return None;
        }
        Some(candidate.with_distribution(distribution))
    }
}

fn step_applies(step: MatchConfidence, file: &LocalFile) -> bool {
    match step {
        MatchConfidence::Exact => file.has_hashes(),
        MatchConfidence::Accurate => file.embedded_id.is_some(),
        MatchConfidence::Loose => !file.display_name.trim().is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchLevel;
    use crate::models::{HashAlgorithm, ProviderKind};
    use crate::providers::Provider;
    use crate::ExportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Scripted {
        kind: Option<ProviderKind>,
        by_hash: Option<ProviderCandidate>,
        by_id: Option<ProviderCandidate>,
        by_name: Vec<ProviderCandidate>,
        fail: bool,
        searched: std::sync::Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(kind: ProviderKind) -> Self {
            Self {
                kind: Some(kind),
                ..Default::default()
            }
        }

        fn candidate(&self, confidence: MatchConfidence) -> ProviderCandidate {
            ProviderCandidate::new(self.kind(), "id", "Name", confidence)
                .with_distribution(Distribution::Allowed)
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn kind(&self) -> ProviderKind {
            self.kind.unwrap_or(ProviderKind::Modrinth)
        }

        async fn lookup_by_hash(&self, _file: &LocalFile) -> Result<Option<ProviderCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExportError::Timeout(std::time::Duration::from_secs(1)));
            }
            Ok(self.by_hash.clone())
        }

        async fn lookup_by_id(&self, _file: &LocalFile) -> Result<Option<ProviderCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.by_id.clone())
        }

        async fn search_by_name(&self, name: &str) -> Result<Vec<ProviderCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.searched.lock().unwrap().push(name.to_string());
            Ok(self.by_name.clone())
        }

        async fn check_distribution_permission(
            &self,
            candidate: &ProviderCandidate,
        ) -> Result<Distribution> {
            Ok(candidate.distribution_allowed)
        }
    }

    fn resolver(providers: Vec<Arc<Scripted>>) -> Resolver {
        let providers = providers
            .into_iter()
            .map(|p| p as DynProvider)
            .collect();
        Resolver::new(Arc::new(ProviderRegistry::new(providers)))
    }

    fn hashed_file() -> LocalFile {
        LocalFile::new("mods/sodium-fabric-0.5.3.jar", 10)
            .with_hash(HashAlgorithm::Sha512, "0f".repeat(64))
            .with_embedded_id("sodium")
    }

    #[tokio::test]
    async fn test_invalid_hash_is_unresolved() {
        let mut modrinth = Scripted::new(ProviderKind::Modrinth);
        modrinth.by_name = vec![modrinth.candidate(MatchConfidence::Loose)];
        let modrinth = Arc::new(modrinth);

        let file = LocalFile::new("mods/bad.jar", 1).with_hash(HashAlgorithm::Sha512, "nothex");
        let resource = resolver(vec![modrinth.clone()])
            .resolve_file(file, &ResolverConfig::new(SearchLevel::Loose))
            .await;

        assert!(!resource.is_resolved());
        assert_eq!(modrinth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_error_falls_through_to_next_provider() {
        let mut github = Scripted::new(ProviderKind::GitHub);
        github.fail = true;
        let mut modrinth = Scripted::new(ProviderKind::Modrinth);
        modrinth.by_hash = Some(modrinth.candidate(MatchConfidence::Exact));

        let resource = resolver(vec![Arc::new(github), Arc::new(modrinth)])
            .resolve_file(hashed_file(), &ResolverConfig::default())
            .await;

        let winner = resource.winning_candidate.unwrap();
        assert_eq!(winner.provider, ProviderKind::Modrinth);
        assert_eq!(winner.match_confidence, MatchConfidence::Exact);
    }

    #[tokio::test]
    async fn test_steps_without_input_are_skipped() {
        let modrinth = Arc::new(Scripted::new(ProviderKind::Modrinth));
        let file = LocalFile::new("mods/plain.jar", 1);

        resolver(vec![modrinth.clone()])
            .resolve_file(file, &ResolverConfig::new(SearchLevel::Accurate))
            .await;

        assert_eq!(modrinth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_accurate_step_runs_after_exact_fails() {
        let mut curseforge = Scripted::new(ProviderKind::CurseForge);
        curseforge.by_id = Some(curseforge.candidate(MatchConfidence::Accurate));

        let resource = resolver(vec![Arc::new(curseforge)])
            .resolve_file(hashed_file(), &ResolverConfig::new(SearchLevel::Accurate))
            .await;

        let winner = resource.winning_candidate.unwrap();
        assert_eq!(winner.match_confidence, MatchConfidence::Accurate);
    }

    #[tokio::test]
    async fn test_loose_search_uses_normalized_name() {
        let mut modrinth = Scripted::new(ProviderKind::Modrinth);
        modrinth.by_name = vec![
            modrinth.candidate(MatchConfidence::Loose),
            ProviderCandidate::new(ProviderKind::Modrinth, "other", "Other", MatchConfidence::Loose),
        ];
        let modrinth = Arc::new(modrinth);

        let file = LocalFile::new("mods/Sodium_Fabric-0.5.3.jar", 1);
        let resource = resolver(vec![modrinth.clone()])
            .resolve_file(file, &ResolverConfig::new(SearchLevel::Loose))
            .await;

        assert_eq!(resource.winning_candidate.unwrap().external_id, "id");
        assert_eq!(*modrinth.searched.lock().unwrap(), vec!["sodium".to_string()]);
    }

    #[tokio::test]
    async fn test_loose_search_keeps_declared_name() {
        let mut modrinth = Scripted::new(ProviderKind::Modrinth);
        modrinth.by_name = vec![modrinth.candidate(MatchConfidence::Loose)];
        let modrinth = Arc::new(modrinth);

        let file = LocalFile::new("mods/fabric-api-0.92.0.jar", 1).with_display_name("Fabric API");
        let resource = resolver(vec![modrinth.clone()])
            .resolve_file(file, &ResolverConfig::new(SearchLevel::Loose))
            .await;

        assert!(resource.is_resolved());
        assert_eq!(
            *modrinth.searched.lock().unwrap(),
            vec!["fabric api".to_string()]
        );
    }

    #[tokio::test]
    async fn test_candidate_above_ceiling_is_ignored() {
        let mut modrinth = Scripted::new(ProviderKind::Modrinth);
        // A provider reporting a weaker confidence than the step asked for.
        modrinth.by_hash = Some(modrinth.candidate(MatchConfidence::Loose));

        let resource = resolver(vec![Arc::new(modrinth)])
            .resolve_file(hashed_file(), &ResolverConfig::new(SearchLevel::Exact))
            .await;
        assert!(!resource.is_resolved());
    }

    #[tokio::test]
    async fn test_forbidden_candidate_continues_to_next_provider() {
        let mut curseforge = Scripted::new(ProviderKind::CurseForge);
        curseforge.by_hash = Some(
            curseforge
                .candidate(MatchConfidence::Exact)
                .with_distribution(Distribution::Denied),
        );
        let mut modrinth = Scripted::new(ProviderKind::Modrinth);
        modrinth.by_hash = Some(modrinth.candidate(MatchConfidence::Exact));

        let resource = resolver(vec![Arc::new(curseforge), Arc::new(modrinth)])
            .resolve_file(hashed_file(), &ResolverConfig::default())
            .await;
        assert_eq!(
            resource.winning_candidate.unwrap().provider,
            ProviderKind::Modrinth
        );
    }
}
