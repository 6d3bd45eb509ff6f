//! mmc-export - convert a MultiMC/Prism instance into provider-backed
//! modpack formats.

mod report;

use anyhow::{Context, Result};
use clap::Parser;
use mmc_export_core::config::default_cache_dir;
use mmc_export_core::{
    ExportOptions, ExportPipeline, FetcherOptions, ProviderEndpoints, ResolverConfig,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "mmc-export")]
#[command(about = "Export a MultiMC/Prism instance to modpack formats")]
struct Args {
    /// Path to the instance directory
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Formats to write (intermediate, modrinth)
    #[arg(short = 'f', long = "format", num_args = 1.., default_value = "intermediate")]
    formats: Vec<String>,

    /// Config overlay (TOML or JSON) used to fill gaps in the parsed data
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How far to search: exact (hash only), accurate (+ embedded id), loose (+ name search)
    #[arg(long, default_value = "exact")]
    modrinth_search: String,

    /// Providers to leave out of the search
    #[arg(long, num_args = 1..)]
    exclude_providers: Vec<String>,

    /// Accept files whose provider forbids redistribution
    #[arg(long)]
    ignore_forbidden: bool,

    /// CurseForge API key
    #[arg(long, env = "CURSEFORGE_API_KEY", hide_env_values = true)]
    curseforge_api_key: Option<String>,

    /// GitHub token for higher rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Response cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Keep responses in memory only
    #[arg(long, conflicts_with = "cache_dir")]
    no_cache: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn resolver_config(&self) -> Result<ResolverConfig> {
        ResolverConfig::from_raw(
            &self.modrinth_search,
            &self.exclude_providers,
            self.ignore_forbidden,
        )
        .context("Invalid resolver options")
    }

    fn endpoints(&self) -> ProviderEndpoints {
        let mut endpoints = ProviderEndpoints::default();
        endpoints.curseforge_api_key = self.curseforge_api_key.clone().filter(|k| !k.is_empty());
        endpoints.github_token = self.github_token.clone().filter(|t| !t.is_empty());
        endpoints
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        if self.no_cache {
            return None;
        }
        Some(self.cache_dir.clone().unwrap_or_else(default_cache_dir))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let resolver = args.resolver_config()?;
    let cache_dir = args.cache_dir();
    match &cache_dir {
        Some(dir) => info!("Response cache: {}", dir.display()),
        None => info!("Response cache: memory only"),
    }

    let pipeline = ExportPipeline::builder()
        .endpoints(args.endpoints())
        .fetcher_options(FetcherOptions::default())
        .cache_dir(cache_dir)
        .build()
        .context("Failed to set up providers")?;

    let mut options = ExportOptions::new(&args.input, &args.output)
        .with_formats(args.formats.clone())
        .with_resolver(resolver);
    if let Some(config) = &args.config {
        options = options.with_config(config);
    }

    let report = pipeline
        .run(&options)
        .await
        .with_context(|| format!("Export of {} failed", args.input.display()))?;

    print!("{}", report::render(&report));
    Ok(())
}
