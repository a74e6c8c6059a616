//! Verinym CLI: Runs the getting-started identity walkthrough.
//!
//! Subcommands: run, init, genesis.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use verinym_core::ScenarioConfig;

/// Verinym: ledger-anchored identity walkthrough.
#[derive(Parser, Debug)]
#[command(name = "verinym", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(long, global = true, default_value = "verinym.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full walkthrough and tear everything down.
    Run(commands::run::RunArgs),
    /// Write a default configuration file.
    Init(commands::init::InitArgs),
    /// Write a genesis file registering a steward.
    Genesis(commands::genesis::GenesisArgs),
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ScenarioConfig::load(&cli.config)?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config.logging.level, &config.logging.format);

    match &cli.command {
        Commands::Run(args) => commands::run::run(args, config).await,
        Commands::Init(args) => commands::init::run(args, &cli.config),
        Commands::Genesis(args) => commands::genesis::run(args).await,
    }
}
