//! Data model shared by the resolver, the pack builder and the writers.

mod candidate;
mod local_file;
mod pack;

pub use candidate::{Distribution, MatchConfidence, ProviderCandidate, ProviderKind};
pub use local_file::{HashAlgorithm, LocalFile};
pub use pack::{
    IntermediatePack, LoaderType, ManifestMetadata, PackManifest, PackMetadata, ResolvedResource,
};
