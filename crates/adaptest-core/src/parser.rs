//! TOML item-bank parser.
//!
//! Loads item banks from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::irt::{THETA_MAX, THETA_MIN};
use crate::model::{Item, ItemCatalog, ItemParams, MAX_GUESSING, MIN_DISCRIMINATION};

/// Intermediate TOML structure for parsing item-bank files.
#[derive(Debug, Deserialize)]
struct TomlItemBankFile {
    item_bank: TomlItemBankHeader,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlItemBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    category: String,
    #[serde(flatten)]
    params: ItemParams,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    prompt: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Parse a single TOML file into an `ItemCatalog`.
pub fn parse_item_bank(path: &Path) -> Result<ItemCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank file: {}", path.display()))?;

    parse_item_bank_str(&content, path)
}

/// Parse a TOML string into an `ItemCatalog`.
pub fn parse_item_bank_str(content: &str, source_path: &Path) -> Result<ItemCatalog> {
    let parsed: TomlItemBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let items = parsed
        .items
        .into_iter()
        .map(|i| {
            if !i.params.is_in_range() {
                tracing::warn!(
                    file = %source_path.display(),
                    item = %i.id,
                    a = i.params.a,
                    c = i.params.c,
                    "item parameters out of range; clamping at use"
                );
            }
            Item {
                id: i.id,
                category: i.category,
                params: i.params,
                active: i.active,
                prompt: i.prompt,
            }
        })
        .collect();

    Ok(ItemCatalog {
        id: parsed.item_bank.id,
        name: parsed.item_bank.name,
        description: parsed.item_bank.description,
        items,
    })
}

/// Recursively load all `.toml` item-bank files from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_item_bank_directory(dir: &Path) -> Result<Vec<ItemCatalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            catalogs.extend(load_item_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_item_bank(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// Load a single file, or merge every bank found under a directory.
pub fn load_item_bank(path: &Path) -> Result<ItemCatalog> {
    if !path.is_dir() {
        return parse_item_bank(path);
    }

    let catalogs = load_item_bank_directory(path)?;
    if catalogs.is_empty() {
        anyhow::bail!("no item banks found in {}", path.display());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "item-bank".to_string());
    let description = catalogs
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(ItemCatalog {
        id: name.clone(),
        name,
        description,
        items: catalogs.into_iter().flat_map(|c| c.items).collect(),
    })
}

/// A warning from item-bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The item ID (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an item bank for calibration and content issues.
///
/// Nothing here is fatal: out-of-range parameters are clamped at use.
pub fn validate_item_bank(catalog: &ItemCatalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for item in &catalog.items {
        if !seen_ids.insert(&item.id) {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("duplicate item ID: {}", item.id),
            });
        }
    }

    for item in &catalog.items {
        let warn = |message: String| ValidationWarning {
            item_id: Some(item.id.clone()),
            message,
        };

        if item.category.trim().is_empty() {
            warnings.push(warn("category is empty".into()));
        }
        if item.params.a < MIN_DISCRIMINATION {
            warnings.push(warn(format!(
                "discrimination a={} is below {MIN_DISCRIMINATION} and will be floored",
                item.params.a
            )));
        }
        if !(0.0..=MAX_GUESSING).contains(&item.params.c) {
            warnings.push(warn(format!(
                "guessing c={} is outside [0, {MAX_GUESSING}] and will be clamped",
                item.params.c
            )));
        }
        if !(THETA_MIN..=THETA_MAX).contains(&item.params.b) {
            warnings.push(warn(format!(
                "difficulty b={} is outside the [{THETA_MIN}, {THETA_MAX}] ability range",
                item.params.b
            )));
        }
    }

    if catalog.active_items().next().is_none() {
        warnings.push(ValidationWarning {
            item_id: None,
            message: "item bank has no active items".into(),
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[item_bank]
id = "literacy"
name = "Literacy Placement"
description = "Spelling and grammar items"

[[items]]
id = "spell-001"
category = "Spelling"
a = 1.2
b = -0.5
c = 0.2
prompt = "Which spelling is correct?"

[[items]]
id = "gram-001"
category = "Grammar"
b = 0.4
active = false
"#;

    #[test]
    fn parse_valid_toml() {
        let catalog = parse_item_bank_str(VALID_TOML, &PathBuf::from("bank.toml")).unwrap();
        assert_eq!(catalog.id, "literacy");
        assert_eq!(catalog.items.len(), 2);
        assert_eq!(catalog.items[0].params, ItemParams::new(1.2, -0.5, 0.2));
        assert_eq!(
            catalog.items[0].prompt.as_deref(),
            Some("Which spelling is correct?")
        );
        assert_eq!(catalog.active_items().count(), 1);
    }

    #[test]
    fn parse_defaults_missing_parameters() {
        let catalog = parse_item_bank_str(VALID_TOML, &PathBuf::from("bank.toml")).unwrap();
        let grammar = &catalog.items[1];
        assert_eq!(grammar.params.a, 1.0);
        assert_eq!(grammar.params.c, 0.25);
        assert!(!grammar.active);
        assert!(grammar.prompt.is_none());
    }

    #[test]
    fn validate_flags_bad_calibration() {
        let toml = r#"
[item_bank]
id = "bad"
name = "Bad"

[[items]]
id = "x"
category = ""
a = 0.05
b = 4.0
c = 0.7

[[items]]
id = "x"
category = "Syntax"
active = false
"#;
        let catalog = parse_item_bank_str(toml, &PathBuf::from("bad.toml")).unwrap();
        // Raw calibration is kept; clamping happens at use.
        assert_eq!(catalog.items[0].params.a, 0.05);
        assert!(!catalog.items[0].params.is_in_range());
        assert!(catalog.items[1].params.is_in_range());
        let warnings = validate_item_bank(&catalog);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate")));
        assert!(messages.iter().any(|m| m.contains("category is empty")));
        assert!(messages.iter().any(|m| m.contains("floored")));
        assert!(messages.iter().any(|m| m.contains("clamped")));
        assert!(messages.iter().any(|m| m.contains("difficulty")));
        assert!(messages.iter().any(|m| m.contains("no active items")));
    }

    #[test]
    fn valid_bank_has_no_warnings() {
        let catalog = parse_item_bank_str(VALID_TOML, &PathBuf::from("bank.toml")).unwrap();
        assert!(validate_item_bank(&catalog).is_empty());
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_item_bank_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "[item_bank\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalogs = load_item_bank_directory(dir.path()).unwrap();
        assert_eq!(catalogs.len(), 1);

        let merged = load_item_bank(dir.path()).unwrap();
        assert_eq!(merged.items.len(), 2);
        assert_eq!(merged.description, "Literacy Placement");
    }
}
