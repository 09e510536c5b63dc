//! sl-db - Database abstraction layer for sqlledger
//!
//! This crate provides the `Database` and `Transaction` traits the migration
//! engine runs against, and their DuckDB implementation.

pub mod duckdb;
pub mod error;
pub mod traits;

pub use duckdb::{DuckDbBackend, DuckDbTransaction};
pub use error::{DbError, DbResult};
pub use traits::{Database, IsolationLevel, SqlValue, Transaction};
