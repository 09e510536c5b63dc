//! Run configuration and its YAML representation.

use crate::discovery::ScriptsBySchema;
use crate::error::{CoreError, CoreResult};
use crate::schema_key::{validate_schema_identifier, SchemaKey};
use crate::script::MigrationScript;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-script command timeout, generous enough for large DDL.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Which schemas a run covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaFilter {
    /// Every schema that has scripts
    All,
    /// A single bare schema name (namespaced before matching)
    Named(String),
}

impl SchemaFilter {
    /// Whether `key` is in scope for this filter.
    pub fn matches(&self, key: &SchemaKey) -> bool {
        match self {
            SchemaFilter::All => true,
            SchemaFilter::Named(name) => *key == SchemaKey::for_schema(name),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SchemaFilter::All)
    }
}

impl From<String> for SchemaFilter {
    fn from(s: String) -> Self {
        if s == "*" || s.eq_ignore_ascii_case("all") {
            SchemaFilter::All
        } else {
            SchemaFilter::Named(s)
        }
    }
}

impl From<&str> for SchemaFilter {
    fn from(s: &str) -> Self {
        SchemaFilter::from(s.to_string())
    }
}

impl From<SchemaFilter> for String {
    fn from(filter: SchemaFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for SchemaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaFilter::All => f.write_str("All"),
            SchemaFilter::Named(name) => f.write_str(name),
        }
    }
}

/// Validated parameters for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Connection target (DuckDB file path or `:memory:`)
    pub connection: String,

    /// Schema name to migrate, or `All` / `*`
    pub schema: SchemaFilter,

    /// Scripts below this version are never applied
    #[serde(default = "default_floor_version")]
    pub floor_version: i64,

    /// Whether discovered scripts are used at all
    #[serde(default = "default_true")]
    pub apply_discovered: bool,

    /// Directory scanned for `.sql` scripts by directory-based callers
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// Per-script time budget in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Scripts supplied in code; they win over discovered scripts per schema
    #[serde(skip)]
    extra_scripts: ScriptsBySchema,
}

fn default_floor_version() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

impl RunConfig {
    /// Create a configuration with defaults for everything but the target and
    /// schema filter.
    pub fn new(connection: impl Into<String>, schema: impl Into<SchemaFilter>) -> Self {
        Self {
            connection: connection.into(),
            schema: schema.into(),
            floor_version: default_floor_version(),
            apply_discovered: true,
            script_dir: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            extra_scripts: ScriptsBySchema::new(),
        }
    }

    /// Set the floor version, builder style.
    pub fn with_floor_version(mut self, floor: i64) -> Self {
        self.floor_version = floor;
        self
    }

    /// Load and validate configuration from a YAML file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigParseError {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> CoreResult<Self> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Register a caller-supplied script under bare schema name `schema`.
    pub fn add_script(
        &mut self,
        schema: &str,
        version: i64,
        name: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.extra_scripts
            .entry(SchemaKey::for_schema(schema))
            .or_default()
            .push(MigrationScript::new(version, name, content));
    }

    /// Scripts registered with [`add_script`](Self::add_script).
    pub fn extra_scripts(&self) -> &ScriptsBySchema {
        &self.extra_scripts
    }

    /// Per-script time budget.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Check the configuration before any I/O happens.
    pub fn validate(&self) -> CoreResult<()> {
        if self.connection.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "connection cannot be empty".to_string(),
            });
        }
        if let SchemaFilter::Named(name) = &self.schema {
            if name.trim().is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: "schema cannot be empty".to_string(),
                });
            }
            validate_schema_identifier(name)?;
        }
        for key in self.extra_scripts.keys() {
            key.validate()?;
        }
        if self.command_timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "command_timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
