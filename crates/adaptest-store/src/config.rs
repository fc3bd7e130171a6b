//! Top-level configuration and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::engine::CatConfig;
use adaptest_core::model::ItemCatalog;
use adaptest_core::traits::CatStores;

use crate::file::JsonFileStore;
use crate::memory::InMemoryStore;

/// Where sessions, responses and learner profiles are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./adaptest-data/state.json")
}

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Engine parameters.
    #[serde(default)]
    pub cat: CatConfig,
    /// Storage backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Item-bank file or directory.
    #[serde(default)]
    pub item_bank: Option<PathBuf>,
    /// Seed for reproducible item selection.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./adaptest-results")
}

impl Default for AdaptestConfig {
    fn default() -> Self {
        Self {
            cat: CatConfig::default(),
            store: StoreConfig::default(),
            item_bank: None,
            seed: None,
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable overrides: `ADAPTEST_MIN_ITEMS`, `ADAPTEST_MAX_ITEMS`,
/// `ADAPTEST_TARGET_SEM`, `ADAPTEST_STORE_PATH`, `ADAPTEST_SEED`.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("adaptest.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AdaptestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    // Resolve env vars in all paths
    config.item_bank = config.item_bank.as_deref().map(resolve_path);
    config.output_dir = resolve_path(&config.output_dir);
    if let StoreConfig::File { path } = &mut config.store {
        *path = resolve_path(path);
    }

    config
        .cat
        .validate()
        .context("invalid [cat] configuration")?;
    Ok(config)
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {key}={value}: {e}"))
}

/// Apply `ADAPTEST_*` overrides read through `lookup`.
pub fn apply_env_overrides(
    config: &mut AdaptestConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("ADAPTEST_MIN_ITEMS") {
        config.cat.min_items = parse_override("ADAPTEST_MIN_ITEMS", &v)?;
    }
    if let Some(v) = lookup("ADAPTEST_MAX_ITEMS") {
        config.cat.max_items = parse_override("ADAPTEST_MAX_ITEMS", &v)?;
    }
    if let Some(v) = lookup("ADAPTEST_TARGET_SEM") {
        config.cat.target_sem = parse_override("ADAPTEST_TARGET_SEM", &v)?;
    }
    if let Some(v) = lookup("ADAPTEST_SEED") {
        config.seed = Some(parse_override("ADAPTEST_SEED", &v)?);
    }
    if let Some(v) = lookup("ADAPTEST_STORE_PATH") {
        config.store = StoreConfig::File {
            path: PathBuf::from(v),
        };
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}

/// Create the collaborator bundle for a store configuration.
pub fn create_store(config: &StoreConfig, catalog: &ItemCatalog) -> CatStores {
    match config {
        StoreConfig::Memory => CatStores::from_shared(Arc::new(InMemoryStore::from_catalog(catalog))),
        StoreConfig::File { path } => {
            tracing::debug!(path = %path.display(), "using file store");
            CatStores::from_shared(Arc::new(JsonFileStore::from_catalog(path, catalog)))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_ADAPTEST_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_ADAPTEST_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_ADAPTEST_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_ADAPTEST_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = AdaptestConfig::default();
        assert_eq!(config.cat.min_items, 20);
        assert_eq!(config.cat.max_items, 20);
        assert!(matches!(config.store, StoreConfig::File { .. }));
        assert!(config.seed.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
item_bank = "item-banks/literacy.toml"
seed = 42

[cat]
min_items = 5
max_items = 15
target_sem = 0.3

[cat.category_targets]
Spelling = 4
Grammar = 4

[store]
type = "memory"
"#;
        let config: AdaptestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cat.min_items, 5);
        assert_eq!(config.cat.target_sem, 0.3);
        assert_eq!(config.cat.tie_threshold, 0.95);
        assert_eq!(config.cat.category_targets.len(), 2);
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn file_store_path_defaults() {
        let config: AdaptestConfig = toml::from_str("[store]\ntype = \"file\"\n").unwrap();
        assert_eq!(
            config.store,
            StoreConfig::File {
                path: default_store_path()
            }
        );
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("ADAPTEST_MIN_ITEMS", "3"),
            ("ADAPTEST_MAX_ITEMS", "8"),
            ("ADAPTEST_TARGET_SEM", "0.4"),
            ("ADAPTEST_SEED", "7"),
            ("ADAPTEST_STORE_PATH", "/tmp/adaptest.json"),
        ]
        .into_iter()
        .collect();

        let mut config = AdaptestConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.cat.min_items, 3);
        assert_eq!(config.cat.max_items, 8);
        assert_eq!(config.cat.target_sem, 0.4);
        assert_eq!(config.seed, Some(7));
        assert_eq!(
            config.store,
            StoreConfig::File {
                path: PathBuf::from("/tmp/adaptest.json")
            }
        );
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = AdaptestConfig::default();
        let err = apply_env_overrides(&mut config, |k| {
            (k == "ADAPTEST_MAX_ITEMS").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("ADAPTEST_MAX_ITEMS"));
    }

    #[test]
    fn explicit_missing_config_fails() {
        let err = load_config_from(Some(Path::new("/nonexistent/adaptest.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
