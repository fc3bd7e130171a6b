//! The `adaptest report` command.

use std::path::PathBuf;

use anyhow::Result;
use uuid::Uuid;

use super::{format_sem, load_workspace, open_engine};

pub async fn execute(
    config_path: Option<PathBuf>,
    item_bank: Option<PathBuf>,
    session_id: Uuid,
    output: Option<PathBuf>,
    format: String,
) -> Result<()> {
    let (config, catalog) = load_workspace(config_path.as_deref(), item_bank)?;
    let engine = open_engine(&config, &catalog)?;
    let report = engine.session_report(session_id).await?;

    let output_dir = output.unwrap_or_else(|| config.output_dir.clone());
    let stem = format!("session-{}", report.session_id);

    let write_json = matches!(format.as_str(), "json" | "all");
    let write_html = matches!(format.as_str(), "html" | "all");

    if write_json || write_html {
        std::fs::create_dir_all(&output_dir)?;
    }
    if write_json {
        let path = output_dir.join(format!("{stem}.json"));
        report.save_json(&path)?;
        println!("JSON report: {}", path.display());
    }
    if write_html {
        let path = output_dir.join(format!("{stem}.html"));
        adaptest_report::write_html_report(&report, &path)?;
        println!("HTML report: {}", path.display());
    }

    if !write_json && !write_html {
        println!(
            "Session {} ({}, {:?})",
            report.session_id, report.kind, report.state
        );
        println!("Learner: {}", report.learner_id);
        println!(
            "Items: {}  Correct: {}  Accuracy: {:.2}%",
            report.responses.len(),
            report.correct_count(),
            report.accuracy_pct()
        );
        println!(
            "Theta: {:.3} -> {:.3}  SEM: {}  Level: {}",
            report.initial_theta,
            report.final_theta(),
            report.sem().map(format_sem).unwrap_or_else(|| "undefined".into()),
            report.level()
        );
        if let Some(summary) = &report.summary {
            println!("Completed: {}", summary.reason);
        }

        let breakdown = report.category_breakdown();
        if !breakdown.is_empty() {
            println!("\nCategories:");
            for (category, counts) in &breakdown {
                println!(
                    "  {category}: {}/{} ({:.2}%)",
                    counts.correct,
                    counts.answered,
                    counts.accuracy_pct()
                );
            }
        }
    }

    Ok(())
}
