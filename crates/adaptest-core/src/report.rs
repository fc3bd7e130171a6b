//! Session reports with JSON persistence and pre/post growth comparison.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::irt::{is_sem_defined, round_to};
use crate::model::{
    normalize_category, AbilityLevel, ResponseEvent, Session, SessionKind, SessionState,
    SessionSummary,
};

/// A session and its complete response history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub learner_id: String,
    pub kind: SessionKind,
    pub state: SessionState,
    pub initial_theta: f64,
    pub current_theta: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present once the session has completed.
    #[serde(default)]
    pub summary: Option<SessionSummary>,
    /// Responses in the order they were recorded.
    pub responses: Vec<ResponseEvent>,
    pub generated_at: DateTime<Utc>,
}

/// Answered and correct counts for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub answered: u32,
    pub correct: u32,
}

impl CategoryBreakdown {
    pub fn accuracy_pct(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            round_to(
                f64::from(self.correct) / f64::from(self.answered) * 100.0,
                2,
            )
        }
    }
}

impl SessionReport {
    pub fn new(session: &Session, responses: Vec<ResponseEvent>) -> Self {
        Self {
            session_id: session.id,
            learner_id: session.learner_id.clone(),
            kind: session.kind,
            state: session.state,
            initial_theta: session.initial_theta,
            current_theta: session.current_theta,
            started_at: session.started_at,
            completed_at: session.completed_at,
            summary: session.summary.clone(),
            responses,
            generated_at: Utc::now(),
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Final theta if completed, otherwise the running estimate.
    pub fn final_theta(&self) -> f64 {
        self.summary
            .as_ref()
            .map(|s| s.final_theta)
            .unwrap_or(self.current_theta)
    }

    pub fn level(&self) -> AbilityLevel {
        AbilityLevel::classify(self.final_theta())
    }

    pub fn correct_count(&self) -> u32 {
        self.responses.iter().filter(|r| r.is_correct).count() as u32
    }

    pub fn accuracy_pct(&self) -> f64 {
        if self.responses.is_empty() {
            return 0.0;
        }
        round_to(
            f64::from(self.correct_count()) / self.responses.len() as f64 * 100.0,
            2,
        )
    }

    /// SEM from the summary, when completed with a defined value.
    pub fn sem(&self) -> Option<f64> {
        self.summary
            .as_ref()
            .map(|s| s.sem)
            .filter(|&sem| is_sem_defined(sem))
    }

    /// Initial theta followed by the estimate after each response.
    pub fn theta_trajectory(&self) -> Vec<f64> {
        std::iter::once(self.initial_theta)
            .chain(self.responses.iter().map(|r| r.theta_after))
            .collect()
    }

    /// Per-category counts keyed by normalized category.
    pub fn category_breakdown(&self) -> BTreeMap<String, CategoryBreakdown> {
        let mut breakdown: BTreeMap<String, CategoryBreakdown> = BTreeMap::new();
        for response in &self.responses {
            let entry = breakdown
                .entry(normalize_category(&response.category))
                .or_default();
            entry.answered += 1;
            if response.is_correct {
                entry.correct += 1;
            }
        }
        breakdown
    }

    /// Growth from `baseline` (typically a pre-assessment) to this report.
    pub fn compare(&self, baseline: &SessionReport) -> GrowthReport {
        let baseline_level = baseline.level();
        let current_level = self.level();

        let baseline_categories = baseline.category_breakdown();
        let current_categories = self.category_breakdown();
        let mut categories = Vec::new();
        for (category, current) in &current_categories {
            if let Some(base) = baseline_categories.get(category) {
                categories.push(CategoryGrowth {
                    category: category.clone(),
                    baseline_accuracy_pct: base.accuracy_pct(),
                    current_accuracy_pct: current.accuracy_pct(),
                    delta: round_to(current.accuracy_pct() - base.accuracy_pct(), 2),
                });
            }
        }

        GrowthReport {
            learner_id: self.learner_id.clone(),
            baseline_session: baseline.session_id,
            current_session: self.session_id,
            baseline_theta: baseline.final_theta(),
            current_theta: self.final_theta(),
            theta_growth: round_to(self.final_theta() - baseline.final_theta(), 3),
            baseline_level,
            current_level,
            level_growth: current_level.rank() - baseline_level.rank(),
            baseline_accuracy_pct: baseline.accuracy_pct(),
            current_accuracy_pct: self.accuracy_pct(),
            accuracy_growth: round_to(self.accuracy_pct() - baseline.accuracy_pct(), 2),
            categories,
        }
    }
}

/// Result of comparing two session reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthReport {
    pub learner_id: String,
    pub baseline_session: Uuid,
    pub current_session: Uuid,
    pub baseline_theta: f64,
    pub current_theta: f64,
    pub theta_growth: f64,
    pub baseline_level: AbilityLevel,
    pub current_level: AbilityLevel,
    /// Difference in level rank; positive means the learner moved up.
    pub level_growth: i32,
    pub baseline_accuracy_pct: f64,
    pub current_accuracy_pct: f64,
    pub accuracy_growth: f64,
    /// Categories present in both sessions.
    pub categories: Vec<CategoryGrowth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGrowth {
    pub category: String,
    pub baseline_accuracy_pct: f64,
    pub current_accuracy_pct: f64,
    pub delta: f64,
}

impl GrowthReport {
    /// Format the growth report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Learner:** {}\n\n**Summary:** theta {:+.3}, level {} → {}, accuracy {:+.2}%\n\n",
            self.learner_id,
            self.theta_growth,
            self.baseline_level,
            self.current_level,
            self.accuracy_growth
        ));

        md.push_str("| Measure | Baseline | Current | Change |\n");
        md.push_str("|---------|----------|---------|--------|\n");
        md.push_str(&format!(
            "| Theta | {:.3} | {:.3} | {:+.3} |\n",
            self.baseline_theta, self.current_theta, self.theta_growth
        ));
        md.push_str(&format!(
            "| Level | {} | {} | {:+} |\n",
            self.baseline_level, self.current_level, self.level_growth
        ));
        md.push_str(&format!(
            "| Accuracy | {:.2}% | {:.2}% | {:+.2}% |\n",
            self.baseline_accuracy_pct, self.current_accuracy_pct, self.accuracy_growth
        ));

        if !self.categories.is_empty() {
            md.push_str("\n### Categories\n\n");
            md.push_str("| Category | Baseline | Current | Change |\n");
            md.push_str("|----------|----------|---------|--------|\n");
            for c in &self.categories {
                md.push_str(&format!(
                    "| {} | {:.2}% | {:.2}% | {:+.2}% |\n",
                    c.category, c.baseline_accuracy_pct, c.current_accuracy_pct, c.delta
                ));
            }
        }

        md
    }

    /// Returns true if theta dropped by more than `threshold`.
    pub fn has_decline(&self, threshold: f64) -> bool {
        self.theta_growth < -threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompletionReason, ItemParams};

    fn event(session: Uuid, item: &str, category: &str, correct: bool, after: f64) -> ResponseEvent {
        ResponseEvent {
            session_id: session,
            learner_id: "learner-1".into(),
            item_id: item.into(),
            category: category.into(),
            is_correct: correct,
            params: ItemParams::new(1.0, 0.0, 0.2),
            theta_before: 0.0,
            theta_after: after,
            recorded_at: Utc::now(),
        }
    }

    fn make_report(kind: SessionKind, final_theta: f64, outcomes: &[(&str, bool)]) -> SessionReport {
        let mut session = Session::new("learner-1", kind, 0.0);
        let responses: Vec<ResponseEvent> = outcomes
            .iter()
            .enumerate()
            .map(|(i, (category, correct))| {
                event(session.id, &format!("i{i}"), category, *correct, final_theta)
            })
            .collect();
        let correct = responses.iter().filter(|r| r.is_correct).count() as u32;
        session.state = SessionState::Completed;
        session.current_theta = final_theta;
        session.summary = Some(SessionSummary {
            total_items: responses.len() as u32,
            correct_count: correct,
            accuracy_pct: 0.0,
            final_theta,
            sem: 0.4,
            level: AbilityLevel::classify(final_theta),
            reason: CompletionReason::MaximumItemsReached,
        });
        SessionReport::new(&session, responses)
    }

    #[test]
    fn growth_between_pre_and_post() {
        let pre = make_report(
            SessionKind::PreAssessment,
            -0.5,
            &[("Spelling", true), ("Spelling", false), ("Grammar", false), ("Grammar", false)],
        );
        let post = make_report(
            SessionKind::PostAssessment,
            0.8,
            &[("Spelling", true), ("Spelling", true), ("grammar", true), ("Grammar", false)],
        );

        let growth = post.compare(&pre);
        assert_eq!(growth.theta_growth, 1.3);
        assert_eq!(growth.baseline_level, AbilityLevel::Basic);
        assert_eq!(growth.current_level, AbilityLevel::Proficient);
        assert_eq!(growth.level_growth, 1);
        assert_eq!(growth.accuracy_growth, 50.0);
        assert!(!growth.has_decline(0.1));

        let grammar = growth
            .categories
            .iter()
            .find(|c| c.category == "grammar")
            .unwrap();
        assert_eq!(grammar.delta, 50.0);
    }

    #[test]
    fn decline_is_detected() {
        let pre = make_report(SessionKind::PreAssessment, 1.0, &[("Syntax", true)]);
        let post = make_report(SessionKind::PostAssessment, 0.5, &[("Syntax", false)]);
        let growth = post.compare(&pre);
        assert!(growth.has_decline(0.2));
        assert!(!growth.has_decline(0.6));
    }

    #[test]
    fn trajectory_starts_at_initial_theta() {
        let report = make_report(SessionKind::PreAssessment, 0.7, &[("Spelling", true), ("Spelling", false)]);
        assert_eq!(report.theta_trajectory(), vec![0.0, 0.7, 0.7]);
        assert_eq!(report.accuracy_pct(), 50.0);
        assert_eq!(report.sem(), Some(0.4));
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report(SessionKind::PreAssessment, 0.3, &[("Grammar", true)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = SessionReport::load_json(&path).unwrap();

        assert_eq!(loaded.session_id, report.session_id);
        assert_eq!(loaded.responses.len(), 1);
        assert_eq!(loaded.kind, SessionKind::PreAssessment);
    }

    #[test]
    fn markdown_output() {
        let pre = make_report(SessionKind::PreAssessment, -1.2, &[("Spelling", false)]);
        let post = make_report(SessionKind::PostAssessment, 0.1, &[("Spelling", true)]);
        let md = post.compare(&pre).to_markdown();
        assert!(md.contains("Below Basic"));
        assert!(md.contains("| Theta |"));
        assert!(md.contains("### Categories"));
    }
}
