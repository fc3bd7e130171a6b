//! Aggregate statistics over a cohort of session reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::irt::round_to;
use crate::model::AbilityLevel;
use crate::report::{CategoryBreakdown, SessionReport};

/// Statistics across many sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortStats {
    pub sessions: usize,
    pub mean_final_theta: f64,
    pub mean_items: f64,
    pub mean_accuracy_pct: f64,
    /// Mean over sessions whose SEM is defined; `None` if there are none.
    pub mean_sem: Option<f64>,
    /// Sessions per ability level label.
    pub level_distribution: BTreeMap<String, usize>,
    /// Pooled counts per normalized category.
    pub per_category: BTreeMap<String, CategoryStats>,
}

/// Pooled results for a single content category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    pub answered: u32,
    pub correct: u32,
    pub accuracy_pct: f64,
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Compute cohort statistics from session reports.
pub fn compute_cohort_stats(reports: &[SessionReport]) -> CohortStats {
    if reports.is_empty() {
        return CohortStats::default();
    }

    let mut level_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for report in reports {
        *level_distribution
            .entry(report.level().label().to_string())
            .or_insert(0) += 1;
    }

    let mut pooled: BTreeMap<String, CategoryBreakdown> = BTreeMap::new();
    for report in reports {
        for (category, counts) in report.category_breakdown() {
            let entry = pooled.entry(category).or_default();
            entry.answered += counts.answered;
            entry.correct += counts.correct;
        }
    }
    let per_category = pooled
        .into_iter()
        .map(|(category, counts)| {
            let stats = CategoryStats {
                answered: counts.answered,
                correct: counts.correct,
                accuracy_pct: counts.accuracy_pct(),
            };
            (category, stats)
        })
        .collect();

    CohortStats {
        sessions: reports.len(),
        mean_final_theta: round_to(
            mean(reports.iter().map(|r| r.final_theta())).unwrap_or(0.0),
            3,
        ),
        mean_items: round_to(
            mean(reports.iter().map(|r| r.responses.len() as f64)).unwrap_or(0.0),
            2,
        ),
        mean_accuracy_pct: round_to(
            mean(reports.iter().map(|r| r.accuracy_pct())).unwrap_or(0.0),
            2,
        ),
        mean_sem: mean(reports.iter().filter_map(|r| r.sem())).map(|m| round_to(m, 4)),
        level_distribution,
        per_category,
    }
}

/// Share of sessions at or above `level`, in percent.
pub fn share_at_or_above(stats: &CohortStats, level: AbilityLevel) -> f64 {
    if stats.sessions == 0 {
        return 0.0;
    }
    let count: usize = [
        AbilityLevel::BelowBasic,
        AbilityLevel::Basic,
        AbilityLevel::Proficient,
        AbilityLevel::Advanced,
    ]
    .iter()
    .filter(|l| **l >= level)
    .filter_map(|l| stats.level_distribution.get(l.label()))
    .sum();
    round_to(count as f64 / stats.sessions as f64 * 100.0, 1)
}
