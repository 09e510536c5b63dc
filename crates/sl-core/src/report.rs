//! Result of one migration run.

use crate::schema_key::SchemaKey;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-schema versions observed and applied during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    last_known_version: BTreeMap<SchemaKey, i64>,
    applied_version: BTreeMap<SchemaKey, i64>,
}

impl MigrationReport {
    /// Build a report. Schemas where nothing was applied must be absent from
    /// `applied_version`.
    pub fn new(
        last_known_version: BTreeMap<SchemaKey, i64>,
        applied_version: BTreeMap<SchemaKey, i64>,
    ) -> Self {
        debug_assert!(applied_version.values().all(|v| *v > 0));
        Self {
            last_known_version,
            applied_version,
        }
    }

    /// Ledger version of each in-scope schema before the run started.
    pub fn last_known_version(&self) -> &BTreeMap<SchemaKey, i64> {
        &self.last_known_version
    }

    /// Highest version applied during the run, for schemas that applied any.
    pub fn applied_version(&self) -> &BTreeMap<SchemaKey, i64> {
        &self.applied_version
    }

    /// Whether the run applied at least one script.
    pub fn has_applied(&self) -> bool {
        !self.applied_version.is_empty()
    }

    pub fn last_known(&self, key: &str) -> Option<i64> {
        self.last_known_version.get(key).copied()
    }

    pub fn applied(&self, key: &str) -> Option<i64> {
        self.applied_version.get(key).copied()
    }
}
