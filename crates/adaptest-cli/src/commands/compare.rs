//! The `adaptest compare` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::report::SessionReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_decline: bool,
    format: String,
) -> Result<()> {
    let baseline = SessionReport::load_json(&baseline_path)?;
    let current = SessionReport::load_json(&current_path)?;

    if baseline.learner_id != current.learner_id {
        tracing::warn!(
            baseline = %baseline.learner_id,
            current = %current.learner_id,
            "comparing sessions from different learners"
        );
    }

    let report = current.compare(&baseline);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Growth for {}: theta {:.3} -> {:.3} ({:+.3})",
                report.learner_id, report.baseline_theta, report.current_theta, report.theta_growth
            );
            println!(
                "Level: {} -> {} ({:+})",
                report.baseline_level, report.current_level, report.level_growth
            );
            println!(
                "Accuracy: {:.2}% -> {:.2}% ({:+.2}%)",
                report.baseline_accuracy_pct, report.current_accuracy_pct, report.accuracy_growth
            );

            if !report.categories.is_empty() {
                println!("\nCategories:");
                for c in &report.categories {
                    println!(
                        "  {} {:.2}% -> {:.2}% ({:+.2}%)",
                        c.category, c.baseline_accuracy_pct, c.current_accuracy_pct, c.delta
                    );
                }
            }
        }
    }

    if fail_on_decline && report.has_decline(threshold) {
        std::process::exit(1);
    }

    Ok(())
}
