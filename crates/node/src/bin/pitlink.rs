//! PitLink launcher: runs the car or ground component set for this node's role

use anyhow::{Context, Result};
use api::init_logging;
use clap::Parser;
use node::{launch, shutdown_signal, Settings};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "pitlink", version, about = "PitLink vehicle telemetry relay")]
struct Cli {
    /// Settings file (defaults to ./pitlink.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    init_logging(&settings.log.level, settings.log.json).context("Failed to initialise logging")?;

    info!("=== PitLink v{} ===", env!("CARGO_PKG_VERSION"));

    let set = launch(&settings, shutdown_signal()).await?;
    info!("Stopped {}", set.components().join(" + "));
    Ok(())
}
