//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mmc_export_core::models::HashAlgorithm;
use mmc_export_core::providers::DynProvider;
use mmc_export_core::{
    Distribution, LocalFile, MatchConfidence, Provider, ProviderCandidate, ProviderKind,
    ProviderRegistry, Resolver, Result,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process provider answering from fixed tables after a random delay.
pub struct FakeProvider {
    kind: ProviderKind,
    by_hash: HashMap<String, ProviderCandidate>,
    by_id: HashMap<String, ProviderCandidate>,
    by_name: HashMap<String, ProviderCandidate>,
    max_latency_ms: u64,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            by_hash: HashMap::new(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            max_latency_ms: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, max_ms: u64) -> Self {
        self.max_latency_ms = max_ms;
        self
    }

    /// Serve `external_id` for files with this SHA-512.
    pub fn hash(mut self, sha512: &str, external_id: &str, distribution: Distribution) -> Self {
        let candidate = self.candidate(external_id, MatchConfidence::Exact, distribution);
        self.by_hash.insert(sha512.to_string(), candidate);
        self
    }

    pub fn id(self, embedded_id: &str, external_id: &str) -> Self {
        self.id_with(embedded_id, external_id, Distribution::Allowed)
    }

    pub fn id_with(mut self, embedded_id: &str, external_id: &str, distribution: Distribution) -> Self {
        let candidate = self.candidate(external_id, MatchConfidence::Accurate, distribution);
        self.by_id.insert(embedded_id.to_string(), candidate);
        self
    }

    pub fn name(self, search: &str, external_id: &str) -> Self {
        self.name_with(search, external_id, Distribution::Allowed)
    }

    pub fn name_with(mut self, search: &str, external_id: &str, distribution: Distribution) -> Self {
        let candidate = self.candidate(external_id, MatchConfidence::Loose, distribution);
        self.by_name.insert(search.to_string(), candidate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn candidate(
        &self,
        external_id: &str,
        confidence: MatchConfidence,
        distribution: Distribution,
    ) -> ProviderCandidate {
        ProviderCandidate::new(self.kind, external_id, external_id, confidence)
            .with_distribution(distribution)
    }

    async fn delay(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.max_latency_ms > 0 {
            let ms = rand::rng().random_range(0..=self.max_latency_ms);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn lookup_by_hash(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        self.delay().await;
        Ok(file
            .hash(HashAlgorithm::Sha512)
            .and_then(|digest| self.by_hash.get(digest))
            .cloned())
    }

    async fn lookup_by_id(&self, file: &LocalFile) -> Result<Option<ProviderCandidate>> {
        self.delay().await;
        Ok(file
            .embedded_id
            .as_ref()
            .and_then(|id| self.by_id.get(id))
            .cloned())
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<ProviderCandidate>> {
        self.delay().await;
        Ok(self.by_name.get(name).cloned().into_iter().collect())
    }

    async fn check_distribution_permission(
        &self,
        candidate: &ProviderCandidate,
    ) -> Result<Distribution> {
        Ok(candidate.distribution_allowed)
    }
}

pub fn resolver(providers: Vec<Arc<FakeProvider>>) -> Resolver {
    let providers: Vec<DynProvider> = providers.into_iter().map(|p| p as DynProvider).collect();
    Resolver::new(Arc::new(ProviderRegistry::new(providers)))
}

/// A distinct, well-formed SHA-512 hex digest for index `n`.
pub fn sha512(n: u8) -> String {
    format!("{:02x}", n).repeat(64)
}

pub fn jar(name: &str, n: u8) -> LocalFile {
    LocalFile::new(format!("mods/{}.jar", name), 100 + n as u64)
        .with_hash(HashAlgorithm::Sha512, sha512(n))
}
