//! Script catalogs: where migration scripts come from.
//!
//! A catalog is nothing more than a list of `(name, bytes)` pairs. Embedded
//! scripts ([`StaticCatalog`]) and a directory of `.sql` files
//! ([`DirectoryCatalog`]) are both valid sources; [`crate::discovery`] turns
//! either into versioned scripts.

use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// One named blob from a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Path-like name, e.g. `billing.3-add-invoices.sql`
    pub name: String,
    /// Raw bytes, expected to be UTF-8
    pub content: Vec<u8>,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A source of named script blobs.
pub trait ScriptCatalog: Send + Sync {
    /// Enumerate all entries. Entries that cannot be read are left out rather
    /// than failing the whole listing.
    fn entries(&self) -> CoreResult<Vec<CatalogEntry>>;
}

/// In-memory catalog, typically built from `include_bytes!` resources.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style.
    pub fn with(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.push(name, content);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.entries.push(CatalogEntry::new(name, content));
    }
}

impl ScriptCatalog for StaticCatalog {
    fn entries(&self) -> CoreResult<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }
}

impl From<Vec<CatalogEntry>> for StaticCatalog {
    fn from(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

/// Catalog backed by the `.sql` files directly inside one directory.
///
/// Subdirectories are not descended into. Entries are returned sorted by
/// file name.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScriptCatalog for DirectoryCatalog {
    fn entries(&self) -> CoreResult<Vec<CatalogEntry>> {
        let read_dir = std::fs::read_dir(&self.root).map_err(|e| CoreError::CatalogIo {
            path: self.root.display().to_string(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Cannot list entry in {}: {}", self.root.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !path.extension().is_some_and(|e| e == "sql") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                log::warn!("Skipping non UTF-8 file name: {}", path.display());
                continue;
            };
            match std::fs::read(&path) {
                Ok(content) => entries.push(CatalogEntry::new(name, content)),
                Err(e) => log::warn!("Cannot read {}: {}", path.display(), e),
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
