use anyhow::{Context, Result};
use clap::Parser;
use scry_cli::config::ScryConfig;
use tracing::{error, info};

use super::artifacts::cmd_artifacts;
use super::commands::Commands;
use super::compile::cmd_compile;
use super::env::CliArgs;
use super::run::cmd_run;
use super::runtime::init_logging;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting scry v{}", env!("CARGO_PKG_VERSION"));

    let loaded = ScryConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = loaded.config;

    let result = match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, &config, cli.output).await,
        Commands::Compile(args) => cmd_compile(args, &config).await,
        Commands::Artifacts(args) => cmd_artifacts(args, &config, cli.output).await,
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
