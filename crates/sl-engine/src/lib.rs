//! Migration engine for sqlledger.
//!
//! Tracks applied scripts in one ledger table per schema key and applies
//! outstanding scripts, each in its own transaction, in ascending version
//! order.

pub mod engine;
pub mod error;
pub mod ledger;
pub mod registry;

pub use engine::{eligibility, Eligibility, Migrator};
pub use error::{MigrationError, MigrationResult};
pub use ledger::{LastApplied, Ledger, LedgerRecord};
pub use registry::{RunKey, RunRegistry};

use sl_core::{discover, MigrationReport, RunConfig, ScriptCatalog, ScriptsBySchema};
use sl_db::DuckDbBackend;

/// Discover scripts in `catalog` and apply them to the DuckDB database named
/// by `config.connection`.
pub async fn migrate(
    config: &RunConfig,
    catalog: &dyn ScriptCatalog,
) -> MigrationResult<MigrationReport> {
    config.validate()?;
    let discovered = if config.apply_discovered {
        discover(catalog)?
    } else {
        ScriptsBySchema::new()
    };
    let db = DuckDbBackend::new(&config.connection).map_err(MigrationError::Connection)?;
    Migrator::new(&db).run(config, discovered).await
}
