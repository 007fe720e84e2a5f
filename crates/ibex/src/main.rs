//! The `ibex` binary.
//!
//! Loads the configuration, sets up logging, registers the built-in
//! processors and the `irc` source kind, then runs until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ibex_adapter_irc::IrcSource;
use ibex_runtime::config::LogLevel;
use ibex_runtime::{ConfigLoader, Ibex, logging};
use tracing::info;

/// Ibex, a multi-protocol chat bot.
///
/// Configuration comes from `ibex.toml` (current directory or the user
/// configuration directory) and `IBEX_*` environment variables.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Load this configuration file instead of searching for one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production` (also `IBEX_PROFILE`).
    #[arg(short, long)]
    profile: Option<String>,

    /// Override the configured log level.
    #[arg(short, long)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    if let Some(level) = args.log_level {
        loader = loader.set("logging.level", level);
    }

    let config = loader.load().context("Failed to load configuration")?;
    logging::init_from_config(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), botname = %config.botname, "Ibex starting");

    let ibex = Ibex::builder()
        .config_loader(loader)
        .processors(ibex_plugins::catalog())
        .source_kind("irc", IrcSource::from_settings)
        .build()
        .context("Failed to build the runtime")?;

    ibex.run().await?;
    Ok(())
}
