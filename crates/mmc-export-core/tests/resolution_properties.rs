//! Resolution policy properties against in-process providers.

mod common;

use common::{jar, resolver, sha512, FakeProvider};
use mmc_export_core::{
    Distribution, LocalFile, MatchConfidence, ProviderKind, ResolverConfig, SearchLevel,
};
use std::sync::Arc;

fn config(level: SearchLevel) -> ResolverConfig {
    ResolverConfig::new(level)
}

#[tokio::test]
async fn test_exact_hash_wins_at_every_level() {
    let curseforge = Arc::new(
        FakeProvider::new(ProviderKind::CurseForge).hash(&sha512(1), "238222", Distribution::Allowed),
    );
    let modrinth = Arc::new(FakeProvider::new(ProviderKind::Modrinth).name("sodium", "AANobbMI"));
    let github = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    let resolver = resolver(vec![modrinth, github, curseforge]);

    for level in [SearchLevel::Exact, SearchLevel::Accurate, SearchLevel::Loose] {
        for excluded in [None, Some(ProviderKind::GitHub), Some(ProviderKind::Modrinth)] {
            let mut cfg = config(level);
            if let Some(kind) = excluded {
                cfg = cfg.exclude(kind);
            }
            let resource = resolver.resolve_file(jar("sodium", 1), &cfg).await;
            let winner = resource.winning_candidate.expect("resolved");
            assert_eq!(winner.provider, ProviderKind::CurseForge);
            assert_eq!(winner.match_confidence, MatchConfidence::Exact);
            assert_eq!(winner.external_id, "238222");
        }
    }
}

#[tokio::test]
async fn test_exact_level_never_loose() {
    let modrinth = Arc::new(FakeProvider::new(ProviderKind::Modrinth).name("sodium", "AANobbMI"));
    let resolver = resolver(vec![modrinth.clone()]);

    let resource = resolver
        .resolve_file(jar("sodium", 1), &config(SearchLevel::Exact))
        .await;
    assert!(!resource.is_resolved());

    let resource = resolver
        .resolve_file(jar("sodium", 1), &config(SearchLevel::Loose))
        .await;
    assert_eq!(
        resource.winning_candidate.map(|c| c.match_confidence),
        Some(MatchConfidence::Loose)
    );
}

#[tokio::test]
async fn test_accurate_level_uses_embedded_id() {
    let curseforge = Arc::new(FakeProvider::new(ProviderKind::CurseForge).id("jei", "238222"));
    let modrinth = Arc::new(FakeProvider::new(ProviderKind::Modrinth).name("jei", "u6dRKJwZ"));
    let resolver = resolver(vec![curseforge, modrinth.clone()]);

    let file = jar("jei", 2).with_embedded_id("jei");
    let resource = resolver.resolve_file(file, &config(SearchLevel::Accurate)).await;
    let winner = resource.winning_candidate.expect("resolved");
    assert_eq!(winner.provider, ProviderKind::CurseForge);
    assert_eq!(winner.match_confidence, MatchConfidence::Accurate);
}

#[tokio::test]
async fn test_excluded_provider_ignored_at_every_level() {
    let modrinth = Arc::new(
        FakeProvider::new(ProviderKind::Modrinth)
            .hash(&sha512(3), "P7dR8mSH", Distribution::Allowed)
            .id("fabric-api", "P7dR8mSH")
            .name("fabric api", "P7dR8mSH"),
    );
    let resolver = resolver(vec![modrinth.clone()]);

    let file = LocalFile::new("mods/fabric-api.jar", 10)
        .with_hash(mmc_export_core::models::HashAlgorithm::Sha512, sha512(3))
        .with_embedded_id("fabric-api");
    let cfg = config(SearchLevel::Loose).exclude(ProviderKind::Modrinth);

    let resource = resolver.resolve_file(file, &cfg).await;
    assert!(!resource.is_resolved());
    assert_eq!(modrinth.calls(), 0);
}

#[tokio::test]
async fn test_forbidden_candidate_requires_flag() {
    let curseforge = Arc::new(
        FakeProvider::new(ProviderKind::CurseForge).hash(&sha512(4), "optifine", Distribution::Denied),
    );
    let resolver = resolver(vec![curseforge]);

    let resource = resolver
        .resolve_file(jar("optifine", 4), &config(SearchLevel::Loose))
        .await;
    assert!(!resource.is_resolved());

    let resource = resolver
        .resolve_file(
            jar("optifine", 4),
            &config(SearchLevel::Loose).with_ignore_forbidden(true),
        )
        .await;
    let winner = resource.winning_candidate.expect("accepted when forbidden is ignored");
    assert_eq!(winner.distribution_allowed, Distribution::Denied);
}

#[tokio::test]
async fn test_forbidden_candidate_falls_through_to_next_provider() {
    let curseforge = Arc::new(
        FakeProvider::new(ProviderKind::CurseForge).hash(&sha512(5), "denied", Distribution::Denied),
    );
    let modrinth = Arc::new(
        FakeProvider::new(ProviderKind::Modrinth).hash(&sha512(5), "allowed", Distribution::Allowed),
    );
    let resolver = resolver(vec![curseforge, modrinth]);

    let resource = resolver
        .resolve_file(jar("lithium", 5), &config(SearchLevel::Exact))
        .await;
    let winner = resource.winning_candidate.expect("resolved");
    assert_eq!(winner.provider, ProviderKind::Modrinth);
    assert_eq!(winner.external_id, "allowed");
}

#[tokio::test]
async fn test_forbidden_exact_match_falls_through_to_later_steps() {
    let curseforge = Arc::new(
        FakeProvider::new(ProviderKind::CurseForge).hash(&sha512(8), "denied", Distribution::Denied),
    );
    let modrinth = Arc::new(
        FakeProvider::new(ProviderKind::Modrinth)
            .id("iris", "YL57xq9U")
            .name("iris", "loose-iris"),
    );
    let resolver = resolver(vec![curseforge, modrinth]);

    let file = jar("iris", 8).with_embedded_id("iris");
    let resource = resolver
        .resolve_file(file, &config(SearchLevel::Accurate))
        .await;
    let winner = resource.winning_candidate.expect("accurate match after denied hash");
    assert_eq!(winner.provider, ProviderKind::Modrinth);
    assert_eq!(winner.match_confidence, MatchConfidence::Accurate);
    assert_eq!(winner.external_id, "YL57xq9U");

    // Without an embedded id the name search is the next step that applies.
    let resource = resolver
        .resolve_file(jar("iris", 8), &config(SearchLevel::Loose))
        .await;
    let winner = resource.winning_candidate.expect("loose match after denied hash");
    assert_eq!(winner.match_confidence, MatchConfidence::Loose);
    assert_eq!(winner.external_id, "loose-iris");

    // Exact level has no later step to fall through to.
    let resource = resolver
        .resolve_file(jar("iris", 8), &config(SearchLevel::Exact))
        .await;
    assert!(!resource.is_resolved());
}

#[tokio::test]
async fn test_every_candidate_denied_leaves_file_unresolved() {
    let curseforge = Arc::new(
        FakeProvider::new(ProviderKind::CurseForge)
            .hash(&sha512(9), "cf-hash", Distribution::Denied)
            .id_with("optifine", "cf-id", Distribution::Denied)
            .name_with("optifine", "cf-name", Distribution::Denied),
    );
    let modrinth = Arc::new(
        FakeProvider::new(ProviderKind::Modrinth).name_with(
            "optifine",
            "mr-name",
            Distribution::Denied,
        ),
    );
    let resolver = resolver(vec![curseforge.clone(), modrinth.clone()]);

    let file = jar("optifine", 9).with_embedded_id("optifine");
    let resource = resolver
        .resolve_file(file, &config(SearchLevel::Loose))
        .await;

    assert!(!resource.is_resolved());
    // Every step was tried on every provider.
    assert_eq!(curseforge.calls(), 3);
    assert_eq!(modrinth.calls(), 3);
}

#[tokio::test]
async fn test_order_stable_under_random_latency() {
    let mut github = FakeProvider::new(ProviderKind::GitHub).with_latency(25);
    let mut modrinth = FakeProvider::new(ProviderKind::Modrinth).with_latency(25);
    for n in 0..40u8 {
        if n % 3 == 0 {
            github = github.hash(&sha512(n), &format!("gh-{}", n), Distribution::Allowed);
        } else if n % 3 == 1 {
            modrinth = modrinth.hash(&sha512(n), &format!("mr-{}", n), Distribution::Allowed);
        }
    }
    let resolver = resolver(vec![Arc::new(github), Arc::new(modrinth)]);

    let files: Vec<LocalFile> = (0..40u8).map(|n| jar(&format!("mod-{:02}", n), n)).collect();
    let expected: Vec<_> = files.iter().map(|f| f.path.clone()).collect();

    for _ in 0..3 {
        let resources = resolver
            .resolve_all(files.clone(), &config(SearchLevel::Exact))
            .await;
        let paths: Vec<_> = resources.iter().map(|r| r.local_file.path.clone()).collect();
        assert_eq!(paths, expected);

        for (n, resource) in resources.iter().enumerate() {
            let external = resource
                .winning_candidate
                .as_ref()
                .map(|c| c.external_id.clone());
            let want = match n % 3 {
                0 => Some(format!("gh-{}", n)),
                1 => Some(format!("mr-{}", n)),
                _ => None,
            };
            assert_eq!(external, want);
        }
    }
}

#[tokio::test]
async fn test_invalid_hash_does_not_abort_batch() {
    let modrinth = Arc::new(
        FakeProvider::new(ProviderKind::Modrinth).hash(&sha512(7), "ok", Distribution::Allowed),
    );
    let resolver = resolver(vec![modrinth]);

    let broken = LocalFile::new("mods/broken.jar", 1)
        .with_hash(mmc_export_core::models::HashAlgorithm::Sha512, "zz");
    let resources = resolver
        .resolve_all(vec![broken, jar("fine", 7)], &config(SearchLevel::Exact))
        .await;

    assert!(!resources[0].is_resolved());
    assert!(resources[1].is_resolved());
}
