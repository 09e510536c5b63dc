//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// sqlledger - apply versioned SQL scripts, one ledger table per schema
#[derive(Parser, Debug)]
#[command(name = "sqlledger")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the YAML run configuration (default: ./sqlledger.yml if present)
    #[arg(short, long, global = true, env = "SQLLEDGER_CONFIG")]
    pub config: Option<String>,

    /// Override the database connection (DuckDB path or :memory:)
    #[arg(long, global = true, env = "SQLLEDGER_CONNECTION")]
    pub connection: Option<String>,

    /// Override the script directory
    #[arg(short, long, global = true)]
    pub dir: Option<String>,

    /// Override the schema filter (a schema name, or All)
    #[arg(short, long, global = true)]
    pub schema: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply outstanding scripts and print the report
    Migrate(MigrateArgs),

    /// Show the ledger and pending scripts of each in-scope schema
    Status(StatusArgs),
}

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Skip scripts with a version below this one
    #[arg(short, long)]
    pub floor: Option<i64>,

    /// Per-script time budget in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
