//! event-relay - relays inbound messaging events to downstream webhooks

#![allow(missing_docs)]

use clap::Parser;
use event_relay::utils::logging::init_logging;
use event_relay::{Config, Relay, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Relays inbound messaging events to downstream webhooks")]
struct Cli {
    /// YAML configuration file; defaults and `RELAY_*` variables are used when absent
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, missing_file) = match &cli.config {
        Some(path) if path.exists() => (Config::from_file(path).await?, None),
        Some(path) => (Config::from_env()?, Some(path)),
        None => (Config::from_env()?, None),
    };
    init_logging(&config.relay.logging)?;
    info!(version = event_relay::VERSION, "Starting event relay");
    if let Some(path) = missing_file {
        warn!(path = %path.display(), "Config file not found, using defaults and environment");
    }

    let relay = Relay::new(config)?;
    relay.start().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    relay.shutdown().await;
    Ok(())
}
