//! Decision-driven perpetual swap trader.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use trading_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli::commands::load_settings(&cli.config);

    // Setup logging
    let logging = settings
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    let log_level = cli
        .log_level
        .map(|level| level.as_str().to_string())
        .unwrap_or_else(|| logging.level.clone());
    let _log_guard = setup_logging(
        &log_level,
        cli.json_logs || logging.is_json(),
        logging.file.as_deref().map(Path::new),
    );

    // Execute command
    match cli.command {
        Commands::Indicators(args) => cli::commands::indicators::run(args, settings?),
        Commands::Paper(args) => cli::commands::paper::run(args, settings?).await,
        Commands::Run(args) => cli::commands::run::run(args, settings?).await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config, settings),
    }
}
