//! Database trait definitions
//!
//! The migration engine only needs a narrow capability set from its host:
//! run statements, read a few rows, and open a transaction it can commit or
//! roll back. Each backend implements these two traits.

use crate::error::DbResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A scalar value passed to or read from the database.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    /// Bound as text; wrap the placeholder in `CAST(? AS TIMESTAMP)`.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SqlValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(ts: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(ts)
    }
}

/// Requested transaction isolation. Backends map this to the strictest level
/// they support at or below the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    Snapshot,
    Serializable,
}

/// Database abstraction trait for sqlledger
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute one or more statements outside any explicit transaction
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Run a query and return every row as a list of values
    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>>;

    /// Open a transaction. The returned handle rolls back when dropped
    /// without a commit.
    async fn begin(&self, isolation: IsolationLevel) -> DbResult<Box<dyn Transaction>>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}

/// An open transaction on a [`Database`].
#[async_trait]
pub trait Transaction: Send {
    /// Execute one batch of statements inside the transaction
    async fn execute_batch(&mut self, sql: &str) -> DbResult<()>;

    /// Execute a single parameterized statement, returning affected rows
    async fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Commit. On failure the transaction is rolled back before returning.
    async fn commit(&mut self) -> DbResult<()>;

    /// Roll back explicitly
    async fn rollback(&mut self) -> DbResult<()>;
}
