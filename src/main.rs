use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod blob_store;
mod config;
mod feed;
mod mirror;
mod server;

use blob_store::FsBlobStore;
use config::{AppConfig, CliConfig, FileConfig};
use feed::Follower;
use mirror::Cloner;
use server::{run_server, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// URL of the origin registry database whose change feed is mirrored.
    #[clap(long)]
    pub feed_url: Option<String>,

    /// Directory the blob store keeps manifests and tarballs in.
    #[clap(long, value_parser = parse_path)]
    pub store_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Download tarballs as soon as their manifest update is observed,
    /// instead of leaving them to be fetched on demand.
    #[clap(long, default_value_t = false)]
    pub eager_download: bool,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to an optional TOML config file. Values in the file override
    /// CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        feed_url: cli_args.feed_url,
        store_dir: cli_args.store_dir,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        eager_download: cli_args.eager_download,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    info!("Opening blob store at {:?}...", config.store_dir);
    let store: blob_store::GuardedBlobStore = Arc::new(FsBlobStore::new(&config.store_dir));

    let cloner = Cloner::new(config.mirror_settings(), store.clone());

    // Log each completed pass; the store itself is the observable output.
    let mut processed = cloner.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = processed.recv().await {
            let name = event
                .json
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("<unknown>");
            info!(
                "processed {} ({} tarballs downloaded)",
                name,
                event.downloaded.len()
            );
        }
    });

    info!(
        "Following {} (eager download: {})",
        config.feed_url, config.eager_download
    );
    let follower = Follower::new(config.follower.clone())?;
    let handler = cloner.handler();
    tokio::spawn(async move {
        if let Err(err) = follower.run(handler).await {
            error!("change feed follower stopped: {err:#}");
        }
    });

    run_server(store, config.logging_level.clone(), config.port).await
}
