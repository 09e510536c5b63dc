//! Per-schema ledger tables.
//!
//! Every schema key owns one table named after the key. A row is appended for
//! each script that was applied, inside the same transaction as the script's
//! statements. Rows are never updated or deleted.

use crate::error::{MigrationError, MigrationResult};
use chrono::{DateTime, Utc};
use sl_core::{MigrationScript, SchemaKey};
use sl_db::{Database, DbError, DbResult, SqlValue, Transaction};

/// The most recent ledger entry of a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastApplied {
    /// `0` when nothing has been applied
    pub version: i64,
    /// Empty when nothing has been applied
    pub hash: String,
}

/// One persisted ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    pub version: i64,
    pub name: String,
    pub hash: String,
    pub script: String,
    pub applied_at: DateTime<Utc>,
}

/// Ledger operations against one database.
pub struct Ledger<'a> {
    db: &'a dyn Database,
}

impl<'a> Ledger<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Create the schema's ledger table if it does not exist yet.
    ///
    /// Safe to call before every read/write cycle. The key is validated
    /// before any DDL is issued.
    pub async fn ensure_table(&self, key: &SchemaKey) -> MigrationResult<()> {
        key.validate()?;
        if self.table_exists(key).await? {
            return Ok(());
        }
        log::debug!("Creating ledger table {}", key);
        self.db
            .execute_batch(&create_table_sql(key))
            .await
            .map_err(|e| ledger_error(key, e))
    }

    /// Read the record with the highest version.
    pub async fn read_last(&self, key: &SchemaKey) -> MigrationResult<LastApplied> {
        key.validate()?;
        let sql = format!(
            "SELECT version, hash FROM {} ORDER BY version DESC LIMIT 1",
            key.table_ident()
        );
        let rows = self
            .db
            .query_rows(&sql, &[])
            .await
            .map_err(|e| ledger_error(key, e))?;
        let Some(row) = rows.first() else {
            return Ok(LastApplied::default());
        };
        let version = row.first().and_then(SqlValue::as_i64);
        let hash = row.get(1).and_then(SqlValue::as_str);
        match (version, hash) {
            (Some(version), Some(hash)) => Ok(LastApplied {
                version,
                hash: hash.to_string(),
            }),
            _ => Err(undecodable(key, row)),
        }
    }

    /// All records of a schema in ascending version order.
    pub async fn history(&self, key: &SchemaKey) -> MigrationResult<Vec<LedgerRecord>> {
        key.validate()?;
        let sql = format!(
            "SELECT version, name, hash, script, creation_date FROM {} ORDER BY version",
            key.table_ident()
        );
        let rows = self
            .db
            .query_rows(&sql, &[])
            .await
            .map_err(|e| ledger_error(key, e))?;
        rows.iter()
            .map(|row| record_from_row(row).ok_or_else(|| undecodable(key, row)))
            .collect()
    }

    /// Whether the schema's ledger table exists.
    pub async fn table_exists(&self, key: &SchemaKey) -> MigrationResult<bool> {
        let rows = self
            .db
            .query_rows(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = ?",
                &[key.as_str().into()],
            )
            .await
            .map_err(|e| ledger_error(key, e))?;
        let count = rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Record `script` as applied. Must run inside the transaction that
    /// executed the script's statements.
    pub async fn append(
        tx: &mut dyn Transaction,
        key: &SchemaKey,
        script: &MigrationScript,
        applied_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO {} (version, name, creation_date, script, hash) \
             VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?)",
            key.table_ident()
        );
        tx.execute_params(
            &sql,
            &[
                script.version.into(),
                script.name.as_str().into(),
                applied_at.into(),
                script.content.as_str().into(),
                script.hash.as_str().into(),
            ],
        )
        .await?;
        Ok(())
    }
}

fn create_table_sql(key: &SchemaKey) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
             version       BIGINT    NOT NULL PRIMARY KEY,
             creation_date TIMESTAMP NOT NULL,
             name          VARCHAR   NOT NULL,
             script        VARCHAR   NOT NULL,
             hash          VARCHAR   NOT NULL
         )",
        key.table_ident()
    )
}

fn record_from_row(row: &[SqlValue]) -> Option<LedgerRecord> {
    match row {
        [version, name, hash, script, applied_at] => Some(LedgerRecord {
            version: version.as_i64()?,
            name: name.as_str()?.to_string(),
            hash: hash.as_str()?.to_string(),
            script: script.as_str()?.to_string(),
            applied_at: applied_at.as_timestamp()?,
        }),
        _ => None,
    }
}

fn undecodable(key: &SchemaKey, row: &[SqlValue]) -> MigrationError {
    ledger_error(
        key,
        DbError::UnexpectedRow(format!("ledger row cannot be decoded: {row:?}")),
    )
}

fn ledger_error(key: &SchemaKey, source: DbError) -> MigrationError {
    MigrationError::Ledger {
        schema: key.to_string(),
        source,
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
