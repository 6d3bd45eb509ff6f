//! Per-run resolution counts.

use crate::models::{MatchConfidence, ProviderKind, ResolvedResource};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts of resolved resources by provider and confidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    pub total: usize,
    pub by_provider: BTreeMap<ProviderKind, usize>,
    pub by_confidence: BTreeMap<MatchConfidence, usize>,
    pub unresolved: usize,
}

impl ResolutionSummary {
    pub fn from_resources(resources: &[ResolvedResource]) -> Self {
        let mut summary = Self {
            total: resources.len(),
            ..Self::default()
        };
        for resource in resources {
            match &resource.winning_candidate {
                Some(candidate) => {
                    *summary.by_provider.entry(candidate.provider).or_default() += 1;
                    *summary
                        .by_confidence
                        .entry(candidate.match_confidence)
                        .or_default() += 1;
                }
                None => summary.unresolved += 1,
            }
        }
        summary
    }

    pub fn resolved(&self) -> usize {
        self.total - self.unresolved
    }
}

impl std::fmt::Display for ResolutionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} resolved", self.resolved(), self.total)?;
        for (provider, count) in &self.by_provider {
            write!(f, ", {} {}", provider, count)?;
        }
        for (confidence, count) in &self.by_confidence {
            write!(f, ", {} {}", confidence, count)?;
        }
        write!(f, ", {} unresolved", self.unresolved)
    }
}
