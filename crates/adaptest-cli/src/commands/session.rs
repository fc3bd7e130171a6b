//! The `adaptest start`, `next`, `answer` and `complete` commands.
//!
//! Each invocation opens the configured store, performs one engine operation
//! and prints the result. Session state lives in the store between calls.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use adaptest_core::engine::{ItemOffer, NextStep};
use adaptest_core::model::{SessionKind, SessionSummary};

use super::{format_sem, load_workspace, open_engine, require_items, OutputFormat, ResponseOutcomeArg};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn start(
    config_path: Option<PathBuf>,
    item_bank: Option<PathBuf>,
    learner: String,
    kind: String,
    theta: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let kind: SessionKind = kind.parse().map_err(anyhow::Error::msg)?;
    let (config, catalog) = load_workspace(config_path.as_deref(), item_bank)?;
    require_items(&catalog)?;
    let engine = open_engine(&config, &catalog)?;

    let session = engine
        .start_session(&learner, kind, theta)
        .await
        .with_context(|| format!("failed to start session for {learner}"))?;

    match format {
        OutputFormat::Json => print_json(&session)?,
        OutputFormat::Text => {
            println!("Session: {}", session.id);
            println!(
                "Learner: {} ({}, starting theta {:.3})",
                session.learner_id, session.kind, session.initial_theta
            );
            println!(
                "Bank: {} ({} active items), {}-{} items, target SEM {}",
                catalog.name,
                catalog.active_items().count(),
                config.cat.min_items,
                config.cat.max_items,
                config.cat.target_sem
            );
        }
    }
    Ok(())
}

pub async fn next(
    config_path: Option<PathBuf>,
    item_bank: Option<PathBuf>,
    session_id: Uuid,
    format: OutputFormat,
) -> Result<()> {
    let (config, catalog) = load_workspace(config_path.as_deref(), item_bank)?;
    require_items(&catalog)?;
    let engine = open_engine(&config, &catalog)?;

    let step = engine.next_item(session_id).await?;
    match format {
        OutputFormat::Json => print_json(&step)?,
        OutputFormat::Text => match &step {
            NextStep::Item(offer) => print_offer(offer),
            NextStep::Complete(summary) => print_summary(summary),
        },
    }
    Ok(())
}

pub async fn answer(
    config_path: Option<PathBuf>,
    item_bank: Option<PathBuf>,
    session_id: Uuid,
    item_id: String,
    outcome: ResponseOutcomeArg,
    format: OutputFormat,
) -> Result<()> {
    let (config, catalog) = load_workspace(config_path.as_deref(), item_bank)?;
    require_items(&catalog)?;
    let engine = open_engine(&config, &catalog)?;

    let outcome = engine
        .record_response(session_id, &item_id, outcome.is_correct())
        .await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => {
            println!("{}", outcome.feedback.message());
            println!(
                "Theta: {:.3} -> {:.3} ({:+.3}), SEM {}, level {}",
                outcome.previous_theta,
                outcome.new_theta,
                outcome.theta_change,
                format_sem(outcome.sem),
                outcome.level
            );
            println!("Responses so far: {}", outcome.total_responses);
        }
    }
    Ok(())
}

pub async fn complete(
    config_path: Option<PathBuf>,
    item_bank: Option<PathBuf>,
    session_id: Uuid,
    format: OutputFormat,
) -> Result<()> {
    let (config, catalog) = load_workspace(config_path.as_deref(), item_bank)?;
    let engine = open_engine(&config, &catalog)?;

    let summary = engine.complete_session(session_id).await?;
    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(())
}

fn print_offer(offer: &ItemOffer) {
    let item = &offer.item;
    println!("Item: {} [{}]", item.id, item.category);
    if let Some(prompt) = &item.prompt {
        println!("Prompt: {prompt}");
    }
    println!(
        "Parameters: a={:.2} b={:.2} c={:.2}",
        item.params.a, item.params.b, item.params.c
    );
    println!(
        "Progress: {} answered, {} remaining ({:.1}%), theta {:.3}",
        offer.items_completed, offer.items_remaining, offer.progress_pct, offer.current_theta
    );
}

pub(crate) fn print_summary(summary: &SessionSummary) {
    println!("Session complete: {}", summary.reason);
    println!(
        "  Items: {} ({} correct, {:.2}%)",
        summary.total_items, summary.correct_count, summary.accuracy_pct
    );
    println!(
        "  Theta: {:.3}  SEM: {}  Level: {}",
        summary.final_theta,
        format_sem(summary.sem),
        summary.level
    );
}
