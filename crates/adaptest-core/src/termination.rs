//! Stopping rule for adaptive sessions.
//!
//! Order matters: the maximum overrides precision, and so does the minimum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why the evaluator decided the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaximumItemsReached,
    MinimumItemsNotReached,
    TargetPrecisionAchieved,
    ContinueAssessment,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::MaximumItemsReached => "maximum items reached",
            StopReason::MinimumItemsNotReached => "minimum items not yet reached",
            StopReason::TargetPrecisionAchieved => "target precision achieved",
            StopReason::ContinueAssessment => "continue assessment",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopDecision {
    pub stop: bool,
    pub reason: StopReason,
}

/// Item-count bounds and precision target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoppingRule {
    pub min_items: u32,
    pub max_items: u32,
    pub target_sem: f64,
}

impl StoppingRule {
    pub fn new(min_items: u32, max_items: u32, target_sem: f64) -> Self {
        Self {
            min_items,
            max_items,
            target_sem,
        }
    }

    pub fn evaluate(&self, items_answered: u32, sem: f64) -> StopDecision {
        let (stop, reason) = if items_answered >= self.max_items {
            (true, StopReason::MaximumItemsReached)
        } else if items_answered < self.min_items {
            (false, StopReason::MinimumItemsNotReached)
        } else if sem <= self.target_sem {
            (true, StopReason::TargetPrecisionAchieved)
        } else {
            (false, StopReason::ContinueAssessment)
        };
        StopDecision { stop, reason }
    }
}

/// Free-function form of [`StoppingRule::evaluate`].
pub fn should_stop(
    items_answered: u32,
    sem: f64,
    min_items: u32,
    max_items: u32,
    target_sem: f64,
) -> StopDecision {
    StoppingRule::new(min_items, max_items, target_sem).evaluate(items_answered, sem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irt::SEM_UNDEFINED;

    #[test]
    fn maximum_overrides_precision() {
        let d = should_stop(20, 5.0, 20, 20, 0.25);
        assert!(d.stop);
        assert_eq!(d.reason, StopReason::MaximumItemsReached);
        assert_eq!(d.reason.to_string(), "maximum items reached");
    }

    #[test]
    fn minimum_overrides_precision() {
        let d = should_stop(5, 0.01, 20, 20, 0.25);
        assert!(!d.stop);
        assert_eq!(d.reason.to_string(), "minimum items not yet reached");
    }

    #[test]
    fn precision_stops_between_bounds() {
        let rule = StoppingRule::new(3, 10, 0.3);
        let d = rule.evaluate(4, 0.3);
        assert!(d.stop);
        assert_eq!(d.reason, StopReason::TargetPrecisionAchieved);

        let d = rule.evaluate(4, 0.31);
        assert!(!d.stop);
        assert_eq!(d.reason.to_string(), "continue assessment");
    }

    #[test]
    fn undefined_sem_never_meets_target() {
        let d = should_stop(5, SEM_UNDEFINED, 3, 10, 0.25);
        assert!(!d.stop);
    }
}
