//! Error types for sl-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Statement execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Unique-key violation or write-write conflict with another transaction (D003)
    #[error("[D003] Write conflict: {0}")]
    Conflict(String),

    /// Transaction management error (D004)
    #[error("[D004] Transaction failed: {0}")]
    TransactionError(String),

    /// A result row did not have the expected columns or types (D005)
    #[error("[D005] Unexpected result row: {0}")]
    UnexpectedRow(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Whether this error means another writer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants for constraint
        // failures, so classify on the message text.
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("duplicate key")
            || lower.contains("violates primary key")
            || lower.contains("violates unique")
            || lower.contains("constraint violated")
            || lower.contains("conflict")
        {
            DbError::Conflict(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}
