//! The `adaptest estimate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::estimator::{AbilityEstimate, AbilityEstimator};
use adaptest_core::irt::{expected_score, recommended_difficulty_range, reliability, standard_error};
use adaptest_core::model::{AbilityLevel, ItemParams, ScoredResponse};

use super::{format_sem, OutputFormat};

/// One line of a response history file.
#[derive(Debug, Deserialize)]
struct ResponseRecord {
    is_correct: bool,
    #[serde(flatten)]
    params: ItemParams,
}

#[derive(Debug, Serialize)]
struct EstimateOutput {
    #[serde(flatten)]
    estimate: AbilityEstimate,
    sem: f64,
    level: AbilityLevel,
    responses: usize,
    expected_score: f64,
    reliability: f64,
    next_difficulty: [f64; 2],
}

pub fn execute(
    responses_path: PathBuf,
    initial_theta: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(&responses_path)
        .with_context(|| format!("failed to read responses: {}", responses_path.display()))?;
    let records: Vec<ResponseRecord> =
        serde_json::from_str(&content).context("failed to parse responses JSON")?;

    let scored: Vec<ScoredResponse> = records
        .iter()
        .map(|r| ScoredResponse::new(r.is_correct, r.params))
        .collect();
    let params: Vec<ItemParams> = scored.iter().map(|r| r.params).collect();

    let estimate = AbilityEstimator::default().estimate_from(&scored, initial_theta)?;
    let range = recommended_difficulty_range(estimate.theta);

    let output = EstimateOutput {
        estimate,
        sem: standard_error(estimate.theta, &params),
        level: AbilityLevel::classify(estimate.theta),
        responses: scored.len(),
        expected_score: expected_score(estimate.theta, &params),
        reliability: reliability(estimate.theta, &params),
        next_difficulty: [*range.start(), *range.end()],
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!(
                "Theta: {:.4} ({:?}, {} iteration(s){})",
                output.estimate.theta,
                output.estimate.method,
                output.estimate.iterations,
                if output.estimate.converged { "" } else { ", not converged" }
            );
            println!("SEM: {}  Level: {}", format_sem(output.sem), output.level);
            println!(
                "Expected score: {:.2} / {}  Reliability: {:.3}",
                output.expected_score, output.responses, output.reliability
            );
            println!(
                "Next items should target b in [{:.2}, {:.2}]",
                output.next_difficulty[0], output.next_difficulty[1]
            );
        }
    }

    Ok(())
}
