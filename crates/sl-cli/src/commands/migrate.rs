//! Migrate command implementation

use anyhow::{Context, Result};
use sl_core::MigrationReport;

use crate::cli::{GlobalArgs, MigrateArgs, OutputFormat};
use crate::commands::common::{load_config, script_catalog};

/// Execute the migrate command
pub async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let mut config = load_config(global)?;
    if let Some(floor) = args.floor {
        config.floor_version = floor;
    }
    if let Some(timeout) = args.timeout {
        config.command_timeout_secs = timeout;
    }
    let catalog = script_catalog(&config)?;

    log::debug!(
        "Migrating {} (schema {}, floor {}) from {}",
        config.connection,
        config.schema,
        config.floor_version,
        catalog.root().display()
    );

    let report = sl_engine::migrate(&config, &catalog)
        .await
        .with_context(|| format!("Migration of {} failed", config.connection))?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &MigrationReport) {
    if report.last_known_version().is_empty() {
        println!("No schemas in scope");
        return;
    }
    for (key, last) in report.last_known_version() {
        match report.applied_version().get(key) {
            Some(applied) => println!("  {key}: {last} -> {applied}"),
            None => println!("  {key}: {last} (up to date)"),
        }
    }
    println!(
        "{} of {} schema(s) migrated",
        report.applied_version().len(),
        report.last_known_version().len()
    );
}
