//! The `adaptest learner` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::model::AbilityLevel;

use super::{format_sem, load_workspace, open_engine, LearnerAction};

pub async fn execute(
    config_path: Option<PathBuf>,
    learner: String,
    action: LearnerAction,
) -> Result<()> {
    let (config, catalog) = load_workspace(config_path.as_deref(), None)?;
    let engine = open_engine(&config, &catalog)?;

    match action {
        LearnerAction::Show => {
            let diagnosis = engine.diagnose_learner(&learner).await?;
            let sessions = engine.stores().sessions.sessions_for(&learner).await?;

            println!(
                "Learner: {learner}  Ability: {:.3} ({})",
                diagnosis.current_ability,
                AbilityLevel::classify(diagnosis.current_ability)
            );
            if diagnosis.at_ceiling {
                println!("  Ability is at the top of the scale.");
            }
            if diagnosis.at_floor {
                println!("  Ability is at the bottom of the scale.");
            }
            if diagnosis.needs_reset {
                println!("  Ability is extreme; consider `adaptest learner --learner {learner} reset`.");
            }

            if !sessions.is_empty() {
                println!("\nSessions:");
                for s in &sessions {
                    let outcome = s
                        .summary
                        .as_ref()
                        .map(|sum| format!("theta {:.3}, {}", sum.final_theta, sum.reason))
                        .unwrap_or_else(|| format!("active, theta {:.3}", s.current_theta));
                    println!(
                        "  {} {} {} ({} items) {}",
                        s.started_at.format("%Y-%m-%d %H:%M"),
                        s.id,
                        s.kind,
                        s.items_answered(),
                        outcome
                    );
                }
            }
        }
        LearnerAction::Recalibrate => {
            let r = engine.recalibrate_learner(&learner).await?;
            println!(
                "Recalibrated {} from {} response(s): {:.3} -> {:.3} ({:+.3})",
                r.learner_id, r.responses_analyzed, r.previous_ability, r.new_ability, r.change
            );
            println!("Level: {}  SEM: {}", r.level, format_sem(r.sem));
        }
        LearnerAction::Reset => {
            let previous = engine.reset_learner(&learner).await?;
            println!("Reset {learner}: {previous:.3} -> 0.000");
        }
    }

    Ok(())
}
