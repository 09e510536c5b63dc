//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{Database, IsolationLevel, SqlValue, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// DuckDB database backend
///
/// One connection guarded by an async mutex. An open [`DuckDbTransaction`]
/// holds the lock until it is committed, rolled back, or dropped.
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open a second, independent connection to the same database instance.
    ///
    /// Each clone has its own transaction stream, which is how two appliers
    /// race against one database inside a single process.
    pub async fn try_clone(&self) -> DbResult<Self> {
        let conn = self.conn.lock().await;
        let cloned = conn
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(cloned))
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql).map_err(DbError::from)
    }

    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql).map_err(DbError::from)?;
        let values: Vec<Value> = params.iter().map(to_duckdb_value).collect();
        // Column count is read from each row: DuckDB panics on
        // `stmt.column_count()` before execution.
        let rows = stmt
            .query_map(duckdb::params_from_iter(values), |row| {
                let col_count = row.as_ref().column_count();
                (0..col_count)
                    .map(|i| row.get::<_, Value>(i).map(from_duckdb_value))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(DbError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::from)?;
        Ok(rows)
    }

    async fn begin(&self, isolation: IsolationLevel) -> DbResult<Box<dyn Transaction>> {
        if isolation != IsolationLevel::Snapshot {
            log::debug!(
                "DuckDB runs transactions under snapshot isolation ({:?} requested)",
                isolation
            );
        }
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))?;
        Ok(Box::new(DuckDbTransaction {
            conn,
            finished: false,
        }))
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

/// A transaction holding exclusive use of a [`DuckDbBackend`] connection.
pub struct DuckDbTransaction {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

impl DuckDbTransaction {
    fn ensure_open(&self) -> DbResult<()> {
        if self.finished {
            return Err(DbError::TransactionError(
                "transaction already finished".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for DuckDbTransaction {
    async fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.ensure_open()?;
        self.conn.execute_batch(sql).map_err(DbError::from)
    }

    async fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.ensure_open()?;
        let values: Vec<Value> = params.iter().map(to_duckdb_value).collect();
        self.conn
            .execute(sql, duckdb::params_from_iter(values))
            .map_err(DbError::from)
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.finished = true;
        if let Err(commit_err) = self.conn.execute_batch("COMMIT") {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("Rollback after failed COMMIT also failed: {}", e);
            }
            return Err(match DbError::from(commit_err) {
                DbError::Conflict(msg) => DbError::Conflict(msg),
                other => DbError::TransactionError(format!("COMMIT failed: {other}")),
            });
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.finished = true;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| DbError::TransactionError(format!("ROLLBACK failed: {e}")))
    }
}

impl Drop for DuckDbTransaction {
    fn drop(&mut self) {
        if !self.finished {
            log::debug!("Rolling back unfinished DuckDB transaction");
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("Rollback of dropped transaction failed: {}", e);
            }
        }
    }
}

fn to_duckdb_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::BigInt(*v),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Timestamp(ts) => Value::Text(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
    }
}

fn from_duckdb_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(b)),
        Value::TinyInt(v) => SqlValue::Integer(i64::from(v)),
        Value::SmallInt(v) => SqlValue::Integer(i64::from(v)),
        Value::Int(v) => SqlValue::Integer(i64::from(v)),
        Value::BigInt(v) => SqlValue::Integer(v),
        Value::UTinyInt(v) => SqlValue::Integer(i64::from(v)),
        Value::USmallInt(v) => SqlValue::Integer(i64::from(v)),
        Value::UInt(v) => SqlValue::Integer(i64::from(v)),
        Value::Text(s) => SqlValue::Text(s),
        Value::Timestamp(unit, raw) => timestamp_from_raw(unit, raw)
            .map(SqlValue::Timestamp)
            .unwrap_or(SqlValue::Null),
        other => SqlValue::Text(format!("{other:?}")),
    }
}

fn timestamp_from_raw(unit: TimeUnit, raw: i64) -> Option<DateTime<Utc>> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros)
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
