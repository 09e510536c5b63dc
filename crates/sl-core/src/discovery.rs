//! Script discovery: catalog entries to versioned scripts grouped by schema.
//!
//! Entry names follow `<schema>.<version>-<name>.sql`. Anything else in the
//! catalog is ignored. Discovery never orders scripts; the engine sorts each
//! schema's scripts by version before applying them.

use crate::catalog::{CatalogEntry, ScriptCatalog};
use crate::error::CoreResult;
use crate::schema_key::{validate_schema_identifier, SchemaKey};
use crate::script::MigrationScript;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Scripts grouped by schema key.
pub type ScriptsBySchema = BTreeMap<SchemaKey, Vec<MigrationScript>>;

/// The parts of a conforming catalog entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptName {
    pub schema: String,
    pub version: i64,
    pub name: String,
}

fn script_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([^.]+)\.(\d+)-([^.]+)\.sql$").expect("valid regex literal")
    })
}

/// Parse a catalog entry name.
///
/// Only the last path segment is considered. The schema is the token right
/// before `.<version>-`, so dotted prefixes such as resource namespaces
/// (`app.scripts.billing.1-init.sql`) are tolerated.
pub fn parse_script_name(entry_name: &str) -> Option<ScriptName> {
    let file_name = entry_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(entry_name);
    let caps = script_name_pattern().captures(file_name)?;
    let version = caps[2].parse::<i64>().ok()?;
    Some(ScriptName {
        schema: caps[1].to_string(),
        version,
        name: caps[3].to_string(),
    })
}

/// Decode script bytes as UTF-8, dropping one leading byte-order mark.
pub fn decode_content(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    Some(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

/// Turn one catalog entry into a keyed script, or `None` if it does not
/// qualify.
fn script_from_entry(entry: &CatalogEntry) -> Option<(SchemaKey, MigrationScript)> {
    let Some(parsed) = parse_script_name(&entry.name) else {
        log::debug!("Ignoring catalog entry '{}': not a migration script", entry.name);
        return None;
    };
    if let Err(e) = validate_schema_identifier(&parsed.schema) {
        log::warn!("Skipping '{}': {}", entry.name, e);
        return None;
    }
    let Some(content) = decode_content(&entry.content) else {
        log::warn!("Skipping '{}': content is not valid UTF-8", entry.name);
        return None;
    };
    Some((
        SchemaKey::for_schema(&parsed.schema),
        MigrationScript::new(parsed.version, parsed.name, content),
    ))
}

/// Discover migration scripts in `catalog`, grouped by schema key.
pub fn discover(catalog: &dyn ScriptCatalog) -> CoreResult<ScriptsBySchema> {
    Ok(discover_entries(&catalog.entries()?))
}

/// Discover migration scripts in an already enumerated list of entries.
pub fn discover_entries(entries: &[CatalogEntry]) -> ScriptsBySchema {
    let mut result = ScriptsBySchema::new();
    for (key, script) in entries.iter().filter_map(script_from_entry) {
        result.entry(key).or_default().push(script);
    }
    result
}

/// Merge caller-supplied scripts with discovered ones.
///
/// Precedence is per schema key: when `extra` has a key, every discovered
/// script for that key is dropped. When `include_discovered` is false only
/// `extra` is returned.
pub fn merge_scripts(
    extra: &ScriptsBySchema,
    discovered: ScriptsBySchema,
    include_discovered: bool,
) -> ScriptsBySchema {
    let mut merged = extra.clone();
    if !include_discovered {
        return merged;
    }
    for (key, scripts) in discovered {
        if merged.contains_key(&key) {
            log::debug!("Discovered scripts for {} overridden by extra scripts", key);
            continue;
        }
        merged.insert(key, scripts);
    }
    merged
}

#[cfg(test)]
#[path = "discovery_test.rs"]
mod tests;
