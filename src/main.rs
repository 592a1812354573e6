use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use convolens::{
    app::{load_config, load_config_from},
    cli::{handle_command, Cli},
    utils::init_logger,
};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logger(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // An explicit --config replaces the global and local config files
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    handle_command(&cli.command, config).await
}
