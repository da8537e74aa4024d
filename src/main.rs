//! Taskforge CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use taskforge::cli::{commands, Cli, Commands};
use taskforge::domain::models::Config;
use taskforge::infrastructure::config::ConfigLoader;
use taskforge::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        taskforge::cli::handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging)).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(args, &config, cli.offline, cli.json).await,
        Commands::Plan(args) => commands::plan::execute(args, &config, cli.offline, cli.json).await,
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    config.context("Failed to load configuration")
}
