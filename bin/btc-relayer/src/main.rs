//! Relays deposits from Bitcoin to the alliance chain and transactions emitted by the alliance
//! chain back to Bitcoin.

use std::{fs, path::Path, process};

use anyhow::Context;
use btc_relayer_common::logging::{self, LoggerConfig};
use clap::Parser;
use config::Config;
use constants::DEFAULT_THREAD_COUNT;
use serde::de::DeserializeOwned;
use tokio::runtime;
use tracing::{debug, error, info};

mod args;
mod bootstrap;
mod config;

mod constants;

fn main() {
    let cli = args::Cli::parse();

    let mut logger_config =
        LoggerConfig::with_base_name("btc-relayer").with_default_directive(&cli.log_level);
    if let Some(url) = logging::get_otlp_url_from_env() {
        logger_config.set_otlp_url(url);
    }
    logging::init(logger_config);

    if let Err(e) = run(&cli.config) {
        error!(?e, "relayer stopped");
        process::exit(1);
    }

    info!("relayer shutdown complete");
}

fn run(config_path: &Path) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting relayer");

    let config = parse_toml::<Config>(config_path)?;
    config.validate().context("invalid configuration")?;

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(config.num_threads.unwrap_or(DEFAULT_THREAD_COUNT).into())
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    runtime.block_on(bootstrap::run(config))
}

/// Reads and parses a TOML file from the given path into the given type `T`.
fn parse_toml<T>(path: impl AsRef<Path>) -> anyhow::Result<T>
where
    T: std::fmt::Debug + DeserializeOwned,
{
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read TOML file {}", path.display()))?;

    let parsed = toml::from_str::<T>(&contents)
        .with_context(|| format!("failed to parse TOML file {}", path.display()))?;
    debug!(?parsed, "parsed TOML file");

    Ok(parsed)
}
