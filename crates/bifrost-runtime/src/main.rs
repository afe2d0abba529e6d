//! # Bifrost
//!
//! Cross-chain bridge daemon: witnesses vault transfers on external chains
//! to the consensus layer and signs the outbound transfers it schedules.
//!
//! ```text
//! bifrost [--config <path>] [--log-level <filter>]
//! ```

use anyhow::{Context, Result};
use bifrost_runtime::{Bifrost, BifrostConfig};
use bifrost_telemetry::{init_tracing, TelemetryConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "bifrost", version, about = "Cross-chain bridge daemon")]
struct Cli {
    /// TOML configuration file; defaults only when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `bf_07_signer=debug`
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = cli.log_level {
        telemetry = telemetry.with_log_level(level);
    }
    init_tracing(&telemetry).context("Failed to initialise tracing")?;

    let config = BifrostConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let bifrost = Bifrost::start(config).await?;

    info!("Bifrost is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    bifrost.stop().await;
    Ok(())
}
