mod file_config;

pub use file_config::{FileConfig, FollowerConfig};

use crate::feed::FollowerSettings;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use std::path::PathBuf;

const CURSOR_FILE: &str = ".feed-seq";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub feed_url: Option<String>,
    pub store_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub eager_download: bool,
}

/// Policy consumed by a `Cloner`, read-only for its lifetime.
#[derive(Debug, Clone, Copy)]
pub struct MirrorSettings {
    /// When false, manifests are stored but tarballs are never fetched
    /// proactively.
    pub eager_download: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed_url: String,
    pub store_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub eager_download: bool,
    pub follower: FollowerSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let feed_url = file
            .feed_url
            .or_else(|| cli.feed_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("feed_url must be specified via --feed-url or in config file")
            })?;

        let store_dir = file
            .store_dir
            .map(PathBuf::from)
            .or_else(|| cli.store_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("store_dir must be specified via --store-dir or in config file")
            })?;

        if !store_dir.exists() {
            bail!("Store directory does not exist: {:?}", store_dir);
        }
        if !store_dir.is_dir() {
            bail!("store_dir is not a directory: {:?}", store_dir);
        }

        let logging_level = match file.logging_level {
            Some(value) => parse_logging_level(&value)?,
            None => cli.logging_level.clone(),
        };

        let follower_file = file.follower.unwrap_or_default();
        let mut follower =
            FollowerSettings::new(feed_url.clone(), store_dir.join(CURSOR_FILE));
        if let Some(value) = follower_file.poll_interval_secs {
            follower.poll_interval_secs = value;
        }
        if let Some(value) = follower_file.batch_limit {
            follower.batch_limit = value;
        }
        if let Some(value) = follower_file.initial_backoff_secs {
            follower.initial_backoff_secs = value;
        }
        if let Some(value) = follower_file.max_backoff_secs {
            follower.max_backoff_secs = value;
        }
        if let Some(value) = follower_file.backoff_multiplier {
            follower.backoff_multiplier = value;
        }

        Ok(AppConfig {
            feed_url,
            store_dir,
            port: file.port.unwrap_or(cli.port),
            logging_level,
            eager_download: file.eager_download.unwrap_or(cli.eager_download),
            follower,
        })
    }

    pub fn mirror_settings(&self) -> MirrorSettings {
        MirrorSettings {
            eager_download: self.eager_download,
        }
    }
}

fn parse_logging_level(value: &str) -> Result<RequestsLoggingLevel> {
    match value.to_lowercase().as_str() {
        "none" => Ok(RequestsLoggingLevel::None),
        "path" => Ok(RequestsLoggingLevel::Path),
        "headers" => Ok(RequestsLoggingLevel::Headers),
        other => bail!("Unknown logging_level in config file: {}", other),
    }
}
