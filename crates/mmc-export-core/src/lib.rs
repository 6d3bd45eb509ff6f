//! mmc-export core - headless modpack resource resolver.
//!
//! Reads a MultiMC/Prism instance, matches every mod file against GitHub,
//! CurseForge and Modrinth, and produces a provider-agnostic intermediate
//! pack that format writers serialize.
//!
//! # Example
//!
//! ```rust,ignore
//! use mmc_export_core::{ExportOptions, ExportPipeline, ResolverConfig, SearchLevel};
//!
//! #[tokio::main]
//! async fn main() -> mmc_export_core::Result<()> {
//!     let pipeline = ExportPipeline::builder().build()?;
//!     let options = ExportOptions::new("./instances/MyPack", "./export")
//!         .with_resolver(ResolverConfig::new(SearchLevel::Accurate));
//!
//!     let report = pipeline.run(&options).await?;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```

pub mod atomic;
pub mod config;
pub mod error;
pub mod hashing;
pub mod models;
pub mod network;
pub mod pack;
pub mod pipeline;
pub mod providers;
pub mod resolver;

pub use config::{ProviderEndpoints, ResolverConfig, SearchLevel};
pub use error::{ExportError, Result};
pub use models::{
    Distribution, IntermediatePack, LocalFile, MatchConfidence, ProviderCandidate, ProviderKind,
    ResolvedResource,
};
pub use network::{CachedFetcher, FetcherOptions};
pub use pipeline::{ExportOptions, ExportPipeline, ExportPipelineBuilder, ExportReport};
pub use providers::{Provider, ProviderRegistry};
pub use resolver::{ResolutionSummary, Resolver};
