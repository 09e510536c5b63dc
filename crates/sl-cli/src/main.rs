//! sqlledger CLI - apply versioned SQL scripts with per-schema ledgers

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::Cli;
use commands::{migrate, status};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match &cli.command {
        cli::Commands::Migrate(args) => migrate::execute(args, &cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global).await,
    }
}
