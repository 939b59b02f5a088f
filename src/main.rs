//! portsweep command-line entry point.

use anyhow::Context;
use clap::Parser;
use portsweep::cli::{Cli, Commands};
use portsweep::config::AppSettings;
use portsweep::output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = AppSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    tracing::debug!(?settings, "settings loaded");

    match &cli.command {
        Commands::Scan(cmd) => cmd.execute(&settings, cli.quiet).await?,
        Commands::Timing(cmd) => cmd.execute(cli.quiet)?,
    }

    Ok(())
}
