//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use adaptest_core::engine::CatEngine;
use adaptest_core::model::ItemCatalog;
use adaptest_core::parser::load_item_bank;
use adaptest_store::{create_store, load_config_from, AdaptestConfig};

pub mod compare;
pub mod estimate;
pub mod init;
pub mod learner;
pub mod report;
pub mod session;
pub mod simulate;
pub mod validate;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// The scored outcome of a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResponseOutcomeArg {
    Correct,
    Incorrect,
}

impl ResponseOutcomeArg {
    pub fn is_correct(self) -> bool {
        self == ResponseOutcomeArg::Correct
    }
}

#[derive(Debug, Subcommand)]
pub enum LearnerAction {
    /// Show the stored ability and its diagnosis
    Show,
    /// Re-estimate ability from recent responses
    Recalibrate,
    /// Reset a stuck ability estimate to 0.0
    Reset,
}

/// Load configuration and the item bank it points at.
///
/// An explicit `item_bank` overrides the configured one. Without either, an
/// empty catalog is used, which is enough for learner commands.
pub fn load_workspace(
    config_path: Option<&Path>,
    item_bank: Option<PathBuf>,
) -> Result<(AdaptestConfig, ItemCatalog)> {
    let mut config = load_config_from(config_path)?;
    if item_bank.is_some() {
        config.item_bank = item_bank;
    }

    let catalog = match &config.item_bank {
        Some(path) => load_item_bank(path)
            .with_context(|| format!("failed to load item bank: {}", path.display()))?,
        None => ItemCatalog::default(),
    };
    tracing::debug!(
        bank = %catalog.id,
        items = catalog.items.len(),
        "item bank loaded"
    );

    Ok((config, catalog))
}

/// Build an engine over the configured store.
pub fn open_engine(config: &AdaptestConfig, catalog: &ItemCatalog) -> Result<CatEngine> {
    let stores = create_store(&config.store, catalog);
    let engine = match config.seed {
        Some(seed) => CatEngine::with_seed(stores, config.cat.clone(), seed)?,
        None => CatEngine::new(stores, config.cat.clone())?,
    };
    Ok(engine)
}

/// Fail early when a session command has nothing to administer.
pub fn require_items(catalog: &ItemCatalog) -> Result<()> {
    if catalog.items.is_empty() {
        anyhow::bail!("no item bank configured; pass --item-bank or set item_bank in adaptest.toml");
    }
    Ok(())
}

pub fn format_sem(sem: f64) -> String {
    if sem >= adaptest_core::irt::SEM_UNDEFINED {
        "undefined".to_string()
    } else {
        format!("{sem:.4}")
    }
}
