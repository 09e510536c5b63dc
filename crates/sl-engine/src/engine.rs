//! Migration engine: outstanding-script selection and transactional apply.
//!
//! For every in-scope schema the engine bootstraps the ledger, reads the last
//! applied version once, and applies each eligible script in ascending version
//! order. A script's statements and its ledger row share one transaction, so a
//! script is either fully applied and recorded, or not at all. The first
//! failure aborts the run; scripts committed before it stay committed.

use crate::error::{MigrationError, MigrationResult};
use crate::ledger::{LastApplied, Ledger};
use crate::registry::{RunKey, RunRegistry};
use chrono::Utc;
use sl_core::{
    merge_scripts, split_batches, MigrationReport, MigrationScript, RunConfig, SchemaKey,
    ScriptsBySchema,
};
use sl_db::{Database, DbError, IsolationLevel, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Why a script is or is not applied in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Version is below the configured floor
    BelowFloor,
    /// Version is at or below the last ledger version
    AlreadyApplied,
    Eligible,
}

/// Decide whether `script` should be applied.
///
/// Any version at or below the last recorded one is skipped, whatever its
/// hash. A changed script at an already-recorded version is never re-run.
pub fn eligibility(script: &MigrationScript, floor_version: i64, last: &LastApplied) -> Eligibility {
    if script.version < floor_version {
        Eligibility::BelowFloor
    } else if script.version <= last.version {
        Eligibility::AlreadyApplied
    } else {
        Eligibility::Eligible
    }
}

/// Applies migration scripts against one database.
pub struct Migrator<'a> {
    db: &'a dyn Database,
    registry: Option<Arc<RunRegistry>>,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db, registry: None }
    }

    /// Share a registry of completed runs with other migrators in the process.
    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Run all outstanding scripts for the schemas selected by `config`.
    ///
    /// `discovered` are the catalog scripts; the config's extra scripts take
    /// precedence over them per schema key.
    pub async fn run(
        &self,
        config: &RunConfig,
        discovered: ScriptsBySchema,
    ) -> MigrationResult<MigrationReport> {
        config.validate()?;

        let run_key = RunKey::from_config(config);
        if let Some(registry) = &self.registry {
            if registry.is_completed(&run_key) {
                log::warn!(
                    "Migration already processed for {} (schema {}), skipping",
                    run_key.connection,
                    run_key.schema
                );
                return Ok(MigrationReport::default());
            }
        }

        log::debug!(
            "Running migrations for schema {} on {}",
            config.schema,
            self.db.db_type()
        );
        let scripts = merge_scripts(config.extra_scripts(), discovered, config.apply_discovered);
        if scripts.is_empty() {
            log::info!("No migration scripts found");
        }

        let ledger = Ledger::new(self.db);
        let mut last_known = BTreeMap::new();
        let mut applied = BTreeMap::new();

        for (key, schema_scripts) in scripts.iter().filter(|(key, _)| config.schema.matches(key)) {
            ledger.ensure_table(key).await?;
            let last = ledger.read_last(key).await?;
            log::info!("Current version of {} is {}", key, last.version);
            last_known.insert(key.clone(), last.version);

            if let Some(version) = self.apply_schema(config, key, schema_scripts, &last).await? {
                log::info!("Schema {} migrated to version {}", key, version);
                applied.insert(key.clone(), version);
            }
        }

        if let Some(registry) = &self.registry {
            registry.mark_completed(run_key);
        }
        Ok(MigrationReport::new(last_known, applied))
    }

    /// Apply the eligible scripts of one schema, returning the newest version
    /// applied, if any.
    async fn apply_schema(
        &self,
        config: &RunConfig,
        key: &SchemaKey,
        scripts: &[MigrationScript],
        last: &LastApplied,
    ) -> MigrationResult<Option<i64>> {
        let mut ordered: Vec<&MigrationScript> = scripts.iter().collect();
        ordered.sort_by_key(|script| script.version);

        let mut newest = None;
        for script in ordered {
            match eligibility(script, config.floor_version, last) {
                Eligibility::BelowFloor => {
                    log::debug!(
                        "Skipping {} v{} '{}': below floor version {}",
                        key,
                        script.version,
                        script.name,
                        config.floor_version
                    );
                    continue;
                }
                Eligibility::AlreadyApplied => {
                    log::debug!(
                        "Skipping {} v{} '{}': already at version {}",
                        key,
                        script.version,
                        script.name,
                        last.version
                    );
                    continue;
                }
                Eligibility::Eligible => {}
            }

            self.apply_script(config, key, script).await?;
            log::info!("Schema {} applied script '{}' (v{})", key, script.name, script.version);
            newest = Some(script.version);
        }
        Ok(newest)
    }

    /// Execute one script and record it, atomically.
    async fn apply_script(
        &self,
        config: &RunConfig,
        key: &SchemaKey,
        script: &MigrationScript,
    ) -> MigrationResult<()> {
        let timeout = config.command_timeout();
        let deadline = Instant::now() + timeout;
        let transaction_error = |source: DbError| MigrationError::Transaction {
            schema: key.to_string(),
            version: script.version,
            source,
        };

        let mut tx = self
            .db
            .begin(IsolationLevel::Serializable)
            .await
            .map_err(transaction_error)?;

        for statement in split_batches(&script.content) {
            let timed_out = || MigrationError::Timeout {
                schema: key.to_string(),
                script: script.name.clone(),
                version: script.version,
                timeout,
            };
            let now = Instant::now();
            if now >= deadline {
                rollback_quietly(tx.as_mut(), key).await;
                return Err(timed_out());
            }

            log::debug!("{} v{}: executing\n{}", key, script.version, statement);
            // A blocking backend only returns once the statement is done, so
            // the deadline is checked again after every statement.
            match tokio::time::timeout(deadline - now, tx.execute_batch(&statement)).await {
                Ok(Ok(())) if Instant::now() >= deadline => {
                    rollback_quietly(tx.as_mut(), key).await;
                    return Err(timed_out());
                }
                Ok(Ok(())) => {}
                Ok(Err(source)) => {
                    rollback_quietly(tx.as_mut(), key).await;
                    return Err(MigrationError::Statement {
                        schema: key.to_string(),
                        script: script.name.clone(),
                        version: script.version,
                        statement,
                        source,
                    });
                }
                Err(_elapsed) => {
                    rollback_quietly(tx.as_mut(), key).await;
                    return Err(timed_out());
                }
            }
        }

        let conflict_or = |source: DbError| {
            if source.is_conflict() {
                MigrationError::LedgerConflict {
                    schema: key.to_string(),
                    version: script.version,
                    source,
                }
            } else {
                transaction_error(source)
            }
        };

        if let Err(source) = Ledger::append(tx.as_mut(), key, script, Utc::now()).await {
            rollback_quietly(tx.as_mut(), key).await;
            return Err(conflict_or(source));
        }
        tx.commit().await.map_err(conflict_or)
    }
}

async fn rollback_quietly(tx: &mut dyn Transaction, key: &SchemaKey) {
    if let Err(e) = tx.rollback().await {
        log::warn!("Rollback failed for {}: {}", key, e);
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
