//! sl-core - Core library for sqlledger
//!
//! This crate provides the value types shared by the migration engine:
//! migration scripts, schema keys, script catalogs and discovery, batch
//! splitting, run configuration, and the run report.

pub mod catalog;
pub mod checksum;
pub mod config;
pub mod discovery;
pub mod error;
pub mod report;
pub mod schema_key;
pub mod script;
pub mod splitter;

pub use catalog::{CatalogEntry, DirectoryCatalog, ScriptCatalog, StaticCatalog};
pub use checksum::compute_checksum;
pub use config::{RunConfig, SchemaFilter};
pub use discovery::{discover, merge_scripts, ScriptsBySchema};
pub use error::{CoreError, CoreResult};
pub use report::MigrationReport;
pub use schema_key::SchemaKey;
pub use script::MigrationScript;
pub use splitter::split_batches;
