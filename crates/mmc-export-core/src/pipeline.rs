//! End-to-end export run.
//!
//! Order of operations:
//! 1. Resolve the requested format writers
//! 2. Load the config overlay, if any
//! 3. Read the manifest and validate pack metadata
//! 4. Resolve every local file
//! 5. Build the intermediate pack and apply the overlay
//! 6. Run the writers
//!
//! Every fatal error surfaces before step 6, so a failed run writes nothing.

use crate::config::{default_cache_dir, ProviderEndpoints, ResolverConfig};
use crate::models::IntermediatePack;
use crate::network::{CachedFetcher, FetcherOptions, FetcherStats};
use crate::pack::{
    build_intermediate, validate_metadata, writer_for, ConfigOverlay, FormatWriter,
    ManifestReader, MultiMcReader,
};
use crate::providers::{DynProvider, ProviderRegistry};
use crate::resolver::{ResolutionSummary, Resolver};
use crate::{ExportError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Inputs of one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Instance directory to read.
    pub input: PathBuf,
    /// Directory the writers write into.
    pub output: PathBuf,
    /// Format names, see [`writer_for`].
    pub formats: Vec<String>,
    /// Optional TOML/JSON overlay document.
    pub config_path: Option<PathBuf>,
    pub resolver: ResolverConfig,
}

impl ExportOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            formats: vec!["intermediate".to_string()],
            config_path: None,
            resolver: ResolverConfig::default(),
        }
    }

    pub fn with_formats(mut self, formats: Vec<String>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub pack: IntermediatePack,
    pub summary: ResolutionSummary,
    /// Primary file written by each writer, in format order.
    pub written: Vec<PathBuf>,
    /// Fetcher counters, when the pipeline owns the fetcher.
    pub fetcher_stats: Option<FetcherStats>,
}

/// Manifest reader, resolver and writers wired together.
pub struct ExportPipeline {
    reader: Arc<dyn ManifestReader>,
    resolver: Resolver,
    fetcher: Option<Arc<CachedFetcher>>,
}

impl ExportPipeline {
    pub fn builder() -> ExportPipelineBuilder {
        ExportPipelineBuilder::default()
    }

    pub fn new(reader: Arc<dyn ManifestReader>, resolver: Resolver) -> Self {
        Self {
            reader,
            resolver,
            fetcher: None,
        }
    }

    /// Run one export.
    pub async fn run(&self, options: &ExportOptions) -> Result<ExportReport> {
        let writers = options
            .formats
            .iter()
            .map(|name| writer_for(name))
            .collect::<Result<Vec<Box<dyn FormatWriter>>>>()?;
        if writers.is_empty() {
            return Err(ExportError::config("no export format requested"));
        }

        let overlay = match &options.config_path {
            Some(path) => Some(ConfigOverlay::load(path)?),
            None => None,
        };

        let reader = self.reader.clone();
        let input = options.input.clone();
        let manifest = tokio::task::spawn_blocking(move || reader.read(&input))
            .await
            .map_err(|e| ExportError::Other(format!("Manifest reader task failed: {}", e)))??;
        info!(
            "Read {} files and {} overrides from {}",
            manifest.files.len(),
            manifest.overrides.len(),
            options.input.display()
        );

        let metadata = match &overlay {
            Some(overlay) => overlay.merge_metadata(manifest.metadata),
            None => manifest.metadata,
        };
        // Reject incomplete metadata before spending any network calls.
        validate_metadata(metadata.clone())?;

        let resources = self
            .resolver
            .resolve_all(manifest.files, &options.resolver)
            .await;

        let mut pack = build_intermediate(metadata, resources, manifest.overrides)?;
        if let Some(overlay) = &overlay {
            let applied = overlay.apply(&mut pack);
            debug!("Applied {} resource overrides", applied);
        }

        let summary = ResolutionSummary::from_resources(&pack.resources);
        info!("{}", summary);

        let mut written = Vec::with_capacity(writers.len());
        for writer in &writers {
            debug!("Running {} writer", writer.name());
            written.push(writer.write(&pack, &options.output)?);
        }

        Ok(ExportReport {
            pack,
            summary,
            written,
            fetcher_stats: self.fetcher.as_ref().map(|f| f.stats()),
        })
    }
}

/// Builder for [`ExportPipeline`].
///
/// ```rust,ignore
/// let pipeline = ExportPipeline::builder()
///     .endpoints(ProviderEndpoints::default().with_curseforge_api_key(key))
///     .cache_dir(Some("/tmp/mmc-cache".into()))
///     .build()?;
/// ```
pub struct ExportPipelineBuilder {
    endpoints: ProviderEndpoints,
    fetcher_options: FetcherOptions,
    reader: Arc<dyn ManifestReader>,
    providers: Option<Vec<DynProvider>>,
}

impl Default for ExportPipelineBuilder {
    fn default() -> Self {
        Self {
            endpoints: ProviderEndpoints::default(),
            fetcher_options: FetcherOptions::default().with_cache_dir(default_cache_dir()),
            reader: Arc::new(MultiMcReader),
            providers: None,
        }
    }
}

impl ExportPipelineBuilder {
    /// Provider base URLs and credentials.
    pub fn endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Fetcher options, replacing the defaults wholesale.
    pub fn fetcher_options(mut self, options: FetcherOptions) -> Self {
        self.fetcher_options = options;
        self
    }

    /// Disk cache location. `None` keeps responses in memory only.
    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.fetcher_options.cache_dir = dir;
        self
    }

    pub fn reader(mut self, reader: Arc<dyn ManifestReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Use these providers instead of the HTTP-backed ones.
    pub fn providers(mut self, providers: Vec<DynProvider>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn build(self) -> Result<ExportPipeline> {
        match self.providers {
            Some(providers) => {
                let registry = Arc::new(ProviderRegistry::new(providers));
                Ok(ExportPipeline::new(self.reader, Resolver::new(registry)))
            }
            None => {
                let fetcher = Arc::new(CachedFetcher::new(self.fetcher_options)?);
                let registry = Arc::new(ProviderRegistry::for_endpoints(
                    fetcher.clone(),
                    &self.endpoints,
                ));
                Ok(ExportPipeline {
                    reader: self.reader,
                    resolver: Resolver::new(registry),
                    fetcher: Some(fetcher),
                })
            }
        }
    }
}
