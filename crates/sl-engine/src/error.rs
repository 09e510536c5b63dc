//! Error types for the migration engine.

use sl_core::CoreError;
use sl_db::DbError;
use std::time::Duration;
use thiserror::Error;

/// Migration engine errors.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Configuration rejected before any I/O (M001).
    #[error("[M001] Invalid migration configuration: {0}")]
    Config(#[from] CoreError),

    /// Could not open the target database (M002).
    #[error("[M002] Migration target connection failed: {0}")]
    Connection(#[source] DbError),

    /// Ledger table bootstrap or read failed (M003).
    #[error("[M003] Ledger operation failed for {schema}: {source}")]
    Ledger {
        schema: String,
        #[source]
        source: DbError,
    },

    /// A statement inside a script failed; the script was rolled back (M004).
    #[error("[M004] Script '{script}' (v{version}) failed for {schema}: {source}\n--- statement ---\n{statement}")]
    Statement {
        schema: String,
        script: String,
        version: i64,
        statement: String,
        #[source]
        source: DbError,
    },

    /// Another applier recorded the same version first (M005).
    #[error("[M005] Ledger conflict for {schema} v{version}: version already recorded by another applier: {source}")]
    LedgerConflict {
        schema: String,
        version: i64,
        #[source]
        source: DbError,
    },

    /// Script exceeded the command timeout and was rolled back (M006).
    #[error("[M006] Script '{script}' (v{version}) for {schema} exceeded the {timeout:?} command timeout")]
    Timeout {
        schema: String,
        script: String,
        version: i64,
        timeout: Duration,
    },

    /// Opening or committing the script transaction failed (M007).
    #[error("[M007] Transaction failed for {schema} v{version}: {source}")]
    Transaction {
        schema: String,
        version: i64,
        #[source]
        source: DbError,
    },
}

/// Result type alias for [`MigrationError`].
pub type MigrationResult<T> = Result<T, MigrationError>;
