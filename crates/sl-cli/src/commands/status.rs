//! Status command implementation

use anyhow::{Context, Result};
use serde_json::json;
use sl_core::{discover, MigrationScript, SchemaKey};
use sl_db::DuckDbBackend;
use sl_engine::{eligibility, Eligibility, LastApplied, Ledger, LedgerRecord};
use std::path::Path;

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{load_config, script_catalog};

/// Ledger contents and outstanding scripts of one schema.
struct SchemaStatus {
    key: SchemaKey,
    records: Vec<LedgerRecord>,
    pending: Vec<MigrationScript>,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    config.validate()?;
    let catalog = script_catalog(&config)?;
    let scripts = discover(&catalog)
        .with_context(|| format!("Failed to read scripts from {}", catalog.root().display()))?;

    let db = open_existing(&config.connection)?;
    let ledger = db.as_ref().map(|db| Ledger::new(db));

    let mut statuses = Vec::new();
    for (key, schema_scripts) in scripts.iter().filter(|(key, _)| config.schema.matches(key)) {
        let has_ledger = match &ledger {
            Some(ledger) => ledger.table_exists(key).await?,
            None => false,
        };
        let (records, last) = match &ledger {
            Some(ledger) if has_ledger => {
                (ledger.history(key).await?, ledger.read_last(key).await?)
            }
            _ => (Vec::new(), LastApplied::default()),
        };

        let mut pending: Vec<MigrationScript> = schema_scripts
            .iter()
            .filter(|s| eligibility(s, config.floor_version, &last) == Eligibility::Eligible)
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.version);

        statuses.push(SchemaStatus {
            key: key.clone(),
            records,
            pending,
        });
    }

    match args.output {
        OutputFormat::Json => print_json(&statuses)?,
        OutputFormat::Text => print_text(&statuses),
    }
    Ok(())
}

/// Open the target database only if it already exists, so that `status`
/// never creates a database file. A missing database has no ledgers.
fn open_existing(connection: &str) -> Result<Option<DuckDbBackend>> {
    if connection != ":memory:" && !Path::new(connection).exists() {
        log::debug!("Database {} does not exist yet", connection);
        return Ok(None);
    }
    let db = DuckDbBackend::new(connection)
        .with_context(|| format!("Failed to open {connection}"))?;
    Ok(Some(db))
}

fn print_text(statuses: &[SchemaStatus]) {
    if statuses.is_empty() {
        println!("No schemas in scope");
        return;
    }
    for status in statuses {
        let current = status.records.last().map_or(0, |r| r.version);
        println!("{} (version {})", status.key, current);
        for record in &status.records {
            println!(
                "  applied  {:>6}  {:<30}  {}  {}",
                record.version,
                record.name,
                record.applied_at.format("%Y-%m-%d %H:%M:%S"),
                record.hash
            );
        }
        for script in &status.pending {
            println!("  pending  {:>6}  {}", script.version, script.name);
        }
    }
}

fn print_json(statuses: &[SchemaStatus]) -> Result<()> {
    let value: Vec<_> = statuses
        .iter()
        .map(|status| {
            json!({
                "schema": status.key,
                "schema_name": status.key.schema_name(),
                "applied": status.records.iter().map(|r| json!({
                    "version": r.version,
                    "name": r.name,
                    "hash": r.hash,
                    "applied_at": r.applied_at.to_rfc3339(),
                })).collect::<Vec<_>>(),
                "pending": status.pending.iter().map(|s| json!({
                    "version": s.version,
                    "name": s.name,
                    "hash": s.hash,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
