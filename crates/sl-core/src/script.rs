//! Migration script value type.

use crate::checksum::compute_checksum;

/// One unit of change for a schema: a versioned, named SQL script.
///
/// Identity is `(schema, version)`; the schema is carried by the map key the
/// script is stored under rather than by the script itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Author-assigned version, strictly increasing within a schema
    pub version: i64,
    /// Human label stored in the ledger
    pub name: String,
    /// Raw script text, one or more batches
    pub content: String,
    /// SHA-256 of `content`, uppercase hex
    pub hash: String,
}

impl MigrationScript {
    /// Create a script, computing its content hash.
    pub fn new(version: i64, name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let hash = compute_checksum(&content);
        Self {
            version,
            name: name.into(),
            content,
            hash,
        }
    }
}
