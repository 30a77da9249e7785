//! pkgbag CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pkgbag_cli::cmd;
use pkgbag_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cmd::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync { snapshots } => cmd::sync::sync(&config, &snapshots).await,
        Commands::Inspect { snapshot } => cmd::inspect::inspect(&config, &snapshot),
        Commands::Verify {
            artifact,
            signature,
        } => cmd::verify::verify(&config, &artifact, &signature),
    }
}
