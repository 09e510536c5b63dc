//! Optional process-local memory of completed runs.
//!
//! Long-lived hosts may trigger migrations from many places (every request
//! scope, every context construction). A [`RunRegistry`] shared between them
//! lets repeated runs against the same target skip the ledger reads entirely.
//! It is only a shortcut: eligibility is always decided by the ledger.

use sl_core::RunConfig;
use std::collections::HashSet;
use std::sync::Mutex;

/// Identity of a run target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub connection: String,
    pub schema: String,
}

impl RunKey {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            connection: config.connection.clone(),
            schema: config.schema.to_string(),
        }
    }
}

/// Set of run targets that completed successfully in this process.
#[derive(Debug, Default)]
pub struct RunRegistry {
    completed: Mutex<HashSet<RunKey>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, key: &RunKey) -> bool {
        self.completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(key)
    }

    pub fn mark_completed(&self, key: RunKey) {
        self.completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key);
    }

    /// Forget a target so the next run reads its ledgers again.
    pub fn forget(&self, key: &RunKey) -> bool {
        self.completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key)
    }
}
