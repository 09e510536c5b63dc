//! Strongly-typed schema key wrapper.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Prefix applied to every schema name so ledger tables never collide with
/// user tables.
pub const SCHEMA_KEY_PREFIX: &str = "__schema_";

/// Characters that may never appear in a schema key, since the key is
/// spliced into DDL as an identifier.
const FORBIDDEN_CHARS: &[char] = &['\'', '"'];

/// Namespaced identifier grouping a set of migration scripts and the ledger
/// table that tracks them (e.g. `__schema_billing`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaKey(String);

impl SchemaKey {
    /// Build the namespaced key for a bare schema name (`billing` ->
    /// `__schema_billing`).
    pub fn for_schema(schema: &str) -> Self {
        Self(format!("{SCHEMA_KEY_PREFIX}{schema}"))
    }

    /// The bare schema name with the namespace prefix removed.
    pub fn schema_name(&self) -> &str {
        self.0.strip_prefix(SCHEMA_KEY_PREFIX).unwrap_or(&self.0)
    }

    /// Check that the key can be used as a ledger table identifier.
    pub fn validate(&self) -> CoreResult<()> {
        validate_schema_identifier(&self.0)
    }

    /// Double-quoted identifier for the ledger table backing this key.
    ///
    /// Callers must have run [`validate`](Self::validate) first.
    pub fn table_ident(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Return the underlying key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reject empty identifiers and identifiers containing a quote character.
pub fn validate_schema_identifier(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidSchemaKey {
            key: name.to_string(),
            reason: "schema key cannot be empty".to_string(),
        });
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(CoreError::InvalidSchemaKey {
            key: name.to_string(),
            reason: format!("schema key cannot contain {c}"),
        });
    }
    Ok(())
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SchemaKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for SchemaKey {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SchemaKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SchemaKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SchemaKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
