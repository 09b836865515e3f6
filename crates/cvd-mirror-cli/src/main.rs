mod commands;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cvd_mirror::{
    FailurePolicy, HeaderReader, MirrorLayout, SigtoolReader, Synchronizer, VersionReader,
};
use cvd_mirror_dns::TxtDirectory;
use cvd_mirror_http::{HttpFetcher, HttpFetcherConfig};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Overrides, VersionReaderConfig};

#[derive(Parser)]
#[command(name = "cvd-mirror")]
#[command(about = "Keep a local mirror of ClamAV signature databases current")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ~/.config/cvd-mirror/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the remote mirror
    #[arg(long, global = true)]
    mirror_url: Option<String>,

    /// Local storage directory
    #[arg(long, global = true)]
    local_dir: Option<PathBuf>,

    /// Dataset to sync; repeat to sync several (replaces the configured list)
    #[arg(long = "dataset", global = true)]
    datasets: Vec<String>,

    /// What to do with the remaining datasets when one fails
    #[arg(long, global = true, value_enum)]
    on_error: Option<OnError>,

    /// Log debug output (version comparisons, skips, progress)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch missing cdiffs and replace out-of-date databases
    Sync,
    /// Show local and remote versions without downloading anything
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    Continue,
    Abort,
}

impl From<OnError> for FailurePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Continue => FailurePolicy::Continue,
            OnError::Abort => FailurePolicy::Abort,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_reader(config: &VersionReaderConfig) -> Box<dyn VersionReader> {
    match config {
        VersionReaderConfig::Sigtool { program } => Box::new(SigtoolReader::new(program)),
        VersionReaderConfig::Header => Box::new(HeaderReader),
    }
}

fn build_synchronizer(config: &AppConfig) -> Result<Synchronizer> {
    let fetcher = HttpFetcher::new(HttpFetcherConfig {
        user_agent: config.user_agent.clone(),
        connect_timeout: config.connect_timeout_secs.map(Duration::from_secs),
        timeout: config.timeout_secs.map(Duration::from_secs),
    })
    .context("failed to build HTTP client")?;

    let sync = Synchronizer::new(
        MirrorLayout::new(config.mirror_url.as_str(), config.local_dir.as_path()),
        Box::new(TxtDirectory::new(config.dns_domain.as_str())),
        Box::new(fetcher),
        build_reader(&config.version_reader),
    )
    .with_datasets(config.datasets.clone())
    .with_policy(config.on_error);

    Ok(sync)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut app_config = config::load_config(cli.config.as_deref())?;
    app_config.apply(Overrides {
        mirror_url: cli.mirror_url,
        local_dir: cli.local_dir,
        datasets: cli.datasets,
        on_error: cli.on_error.map(FailurePolicy::from),
    });

    let sync = build_synchronizer(&app_config)?;

    match cli.command {
        Command::Sync => commands::sync::run(&sync).await,
        Command::Status => commands::status::run(&sync).await,
    }
}
