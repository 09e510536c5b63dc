//! Shared utilities for CLI commands

use anyhow::{bail, Context, Result};
use sl_core::{DirectoryCatalog, RunConfig};
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Config file picked up from the working directory when `--config` is absent.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "sqlledger.yml";

/// Build the run configuration from the config file and command-line
/// overrides.
///
/// An explicit `--config` must exist. Without one, `./sqlledger.yml` is used
/// when present; otherwise `--connection` and `--schema` are required.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<RunConfig> {
    let mut config = match &global.config {
        Some(path) => RunConfig::load(Path::new(path))
            .with_context(|| format!("Failed to load configuration file {path}"))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            RunConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .context("Failed to load sqlledger.yml")?
        }
        None => {
            let (Some(connection), Some(schema)) = (&global.connection, &global.schema) else {
                bail!(
                    "No configuration found: pass --config, create {DEFAULT_CONFIG_FILE}, \
                     or give both --connection and --schema"
                );
            };
            RunConfig::new(connection.as_str(), schema.as_str())
        }
    };

    if let Some(connection) = &global.connection {
        config.connection = connection.clone();
    }
    if let Some(schema) = &global.schema {
        config.schema = schema.as_str().into();
    }
    if let Some(dir) = &global.dir {
        config.script_dir = Some(PathBuf::from(dir));
    }
    Ok(config)
}

/// Filesystem catalog rooted at the configured script directory.
pub(crate) fn script_catalog(config: &RunConfig) -> Result<DirectoryCatalog> {
    let Some(dir) = &config.script_dir else {
        bail!("No script directory configured: set script_dir or pass --dir");
    };
    Ok(DirectoryCatalog::new(dir.clone()))
}
