//! Maximum-likelihood ability estimation.
//!
//! Newton-Raphson on the 3PL log-likelihood, with the edge cases split out
//! as named strategies so each one can be exercised on its own:
//!
//! - [`starting_theta`]: pulls extreme start values back from the boundary
//! - [`DegenerateHistory`]: closed-form answers for all-correct / all-incorrect
//! - [`newton_step`]: Newton step with a fixed-size gradient fallback and clipping

use serde::{Deserialize, Serialize};

use crate::error::CatError;
use crate::irt::{clamp_theta, probability, round_to, SCALING_D, THETA_MAX, THETA_MIN};
use crate::model::{ItemParams, ScoredResponse};

/// |θ| at or beyond which iteration starts from ±1.5 instead.
pub const EXTREME_START: f64 = 2.5;

/// Start value used in place of an extreme initial θ.
pub const SAFE_START: f64 = 1.5;

/// Offset added beyond the hardest/easiest item for degenerate histories.
pub const DEGENERATE_OFFSET: f64 = 1.5;

/// Largest θ change allowed per iteration.
pub const MAX_STEP: f64 = 0.5;

/// |second derivative| below which the Newton step is replaced.
pub const FLAT_HESSIAN: f64 = 0.0001;

/// Bounds applied to P and Q inside the derivative sums.
const PROB_FLOOR: f64 = 0.0001;
const PROB_CEIL: f64 = 0.9999;

/// Newton-Raphson stopping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Iteration cap.
    pub max_iterations: u32,
    /// Converged once |step| falls below this.
    pub tolerance: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 0.001,
        }
    }
}

/// How an estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// No responses: the initial value was returned.
    Initial,
    AllCorrect,
    AllIncorrect,
    NewtonRaphson,
}

/// Result of one estimation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    /// Always within [-3, 3].
    pub theta: f64,
    pub method: EstimationMethod,
    /// Newton-Raphson iterations performed (0 for closed-form results).
    pub iterations: u32,
    /// `false` when the iteration cap was hit before |step| < tolerance.
    pub converged: bool,
}

/// Iteration start value: extreme initial values begin from ±1.5, where the
/// likelihood derivatives have not yet vanished.
pub fn starting_theta(initial_theta: f64) -> f64 {
    if initial_theta >= EXTREME_START {
        SAFE_START
    } else if initial_theta <= -EXTREME_START {
        -SAFE_START
    } else {
        initial_theta
    }
}

/// Response histories for which the MLE does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateHistory {
    AllCorrect,
    AllIncorrect,
}

impl DegenerateHistory {
    /// Classify a non-empty history; `None` when it contains both outcomes.
    pub fn detect(responses: &[ScoredResponse]) -> Option<Self> {
        if responses.is_empty() {
            return None;
        }
        let correct = responses.iter().filter(|r| r.is_correct).count();
        if correct == responses.len() {
            Some(DegenerateHistory::AllCorrect)
        } else if correct == 0 {
            Some(DegenerateHistory::AllIncorrect)
        } else {
            None
        }
    }

    /// All correct: 1.5 above the hardest item (max 3.0).
    /// All incorrect: 1.5 below the easiest item (min -3.0).
    pub fn estimate(self, responses: &[ScoredResponse]) -> f64 {
        match self {
            DegenerateHistory::AllCorrect => {
                let hardest = responses
                    .iter()
                    .map(|r| r.params.b)
                    .fold(THETA_MIN, f64::max);
                (hardest + DEGENERATE_OFFSET).min(THETA_MAX)
            }
            DegenerateHistory::AllIncorrect => {
                let easiest = responses
                    .iter()
                    .map(|r| r.params.b)
                    .fold(THETA_MAX, f64::min);
                (easiest - DEGENERATE_OFFSET).max(THETA_MIN)
            }
        }
    }

    pub fn method(self) -> EstimationMethod {
        match self {
            DegenerateHistory::AllCorrect => EstimationMethod::AllCorrect,
            DegenerateHistory::AllIncorrect => EstimationMethod::AllIncorrect,
        }
    }
}

/// First and second derivative of the 3PL log-likelihood at one θ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodDerivatives {
    pub first: f64,
    pub second: f64,
}

impl LikelihoodDerivatives {
    pub fn at(theta: f64, responses: &[ScoredResponse]) -> Self {
        let mut first = 0.0;
        let mut second = 0.0;

        for response in responses {
            let ItemParams { a, b, c } = response.params.sanitized();
            let u = if response.is_correct { 1.0 } else { 0.0 };

            let p_raw = probability(theta, a, b, c);
            let p = p_raw.clamp(PROB_FLOOR, PROB_CEIL);
            let q = (1.0 - p_raw).clamp(PROB_FLOOR, PROB_CEIL);

            // P* = (P - c) / (1 - c); 1 - c ≥ 0.5 after sanitizing.
            let p_star = (p - c) / (1.0 - c);

            first += SCALING_D * a * (u - p) * p_star / p;
            second -= (SCALING_D * a).powi(2) * p_star * q * p_star;
        }

        Self { first, second }
    }
}

/// Which rule produced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Newton,
    /// Near-flat Hessian: fixed-size move in the gradient's direction.
    GradientFallback,
}

/// Next θ change, clipped to ±[`MAX_STEP`].
pub fn newton_step(derivatives: LikelihoodDerivatives) -> (f64, StepKind) {
    let (raw, kind) = if derivatives.second.abs() < FLAT_HESSIAN {
        let direction = if derivatives.first > 0.0 { 1.0 } else { -1.0 };
        (MAX_STEP * direction, StepKind::GradientFallback)
    } else {
        (-derivatives.first / derivatives.second, StepKind::Newton)
    };

    (raw.clamp(-MAX_STEP, MAX_STEP), kind)
}

/// Ability estimator with fixed stopping parameters.
#[derive(Debug, Clone, Default)]
pub struct AbilityEstimator {
    config: EstimatorConfig,
}

impl AbilityEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Point estimate of θ from `responses`, starting at `initial_theta`.
    ///
    /// An empty history returns the initial value (kept within [-3, 3]).
    pub fn estimate(&self, responses: &[ScoredResponse], initial_theta: f64) -> AbilityEstimate {
        if responses.is_empty() {
            return AbilityEstimate {
                theta: clamp_theta(initial_theta),
                method: EstimationMethod::Initial,
                iterations: 0,
                converged: true,
            };
        }

        if let Some(degenerate) = DegenerateHistory::detect(responses) {
            let theta = degenerate.estimate(responses);
            tracing::debug!(?degenerate, theta, "closed-form ability estimate");
            return AbilityEstimate {
                theta,
                method: degenerate.method(),
                iterations: 0,
                converged: true,
            };
        }

        let mut theta = starting_theta(initial_theta);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;
            let derivatives = LikelihoodDerivatives::at(theta, responses);
            let (step, kind) = newton_step(derivatives);
            if kind == StepKind::GradientFallback {
                tracing::trace!(theta, "flat likelihood, gradient step");
            }

            theta = clamp_theta(theta + step);

            if step.abs() < self.config.tolerance {
                converged = true;
                break;
            }
        }

        let theta = round_to(clamp_theta(theta), 4);
        tracing::debug!(
            theta,
            iterations,
            converged,
            responses = responses.len(),
            "newton-raphson ability estimate"
        );

        AbilityEstimate {
            theta,
            method: EstimationMethod::NewtonRaphson,
            iterations,
            converged,
        }
    }

    /// Like [`estimate`](Self::estimate), for callers whose start value is optional.
    ///
    /// Fails only when there is neither a history nor a start value; with a
    /// history and no start value iteration begins at 0.0.
    pub fn estimate_from(
        &self,
        responses: &[ScoredResponse],
        initial_theta: Option<f64>,
    ) -> Result<AbilityEstimate, CatError> {
        match initial_theta {
            Some(theta) => Ok(self.estimate(responses, theta)),
            None if responses.is_empty() => Err(CatError::MissingInitialTheta),
            None => Ok(self.estimate(responses, 0.0)),
        }
    }
}

/// Estimate θ with the default iteration cap (50) and tolerance (0.001).
pub fn estimate_ability(responses: &[ScoredResponse], initial_theta: f64) -> f64 {
    AbilityEstimator::default()
        .estimate(responses, initial_theta)
        .theta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(is_correct: bool, a: f64, b: f64, c: f64) -> ScoredResponse {
        ScoredResponse::new(is_correct, ItemParams::new(a, b, c))
    }

    fn mixed_history() -> Vec<ScoredResponse> {
        vec![
            resp(true, 1.5, -1.0, 0.25),
            resp(true, 1.3, -0.5, 0.25),
            resp(true, 1.4, 0.0, 0.25),
            resp(false, 1.6, 0.5, 0.25),
            resp(true, 1.5, 0.3, 0.25),
            resp(false, 1.8, 1.0, 0.25),
        ]
    }

    #[test]
    fn empty_history_returns_initial() {
        let est = AbilityEstimator::default().estimate(&[], 0.7);
        assert_eq!(est.theta, 0.7);
        assert_eq!(est.method, EstimationMethod::Initial);
    }

    #[test]
    fn empty_history_without_initial_is_error() {
        let err = AbilityEstimator::default()
            .estimate_from(&[], None)
            .unwrap_err();
        assert!(matches!(err, CatError::MissingInitialTheta));

        let ok = AbilityEstimator::default()
            .estimate_from(&mixed_history(), None)
            .unwrap();
        assert_eq!(ok.method, EstimationMethod::NewtonRaphson);
    }

    #[test]
    fn starting_theta_pulls_back_extremes() {
        assert_eq!(starting_theta(2.5), 1.5);
        assert_eq!(starting_theta(3.0), 1.5);
        assert_eq!(starting_theta(-2.5), -1.5);
        assert_eq!(starting_theta(-10.0), -1.5);
        assert_eq!(starting_theta(2.4), 2.4);
        assert_eq!(starting_theta(0.0), 0.0);
    }

    #[test]
    fn all_correct_is_above_hardest_item() {
        let responses = vec![
            resp(true, 1.0, -1.0, 0.25),
            resp(true, 1.0, 0.0, 0.25),
            resp(true, 1.0, 0.5, 0.25),
        ];
        assert_eq!(estimate_ability(&responses, 0.0), 2.0);
        assert_eq!(
            DegenerateHistory::detect(&responses),
            Some(DegenerateHistory::AllCorrect)
        );
    }

    #[test]
    fn all_incorrect_is_below_easiest_item() {
        let responses = vec![
            resp(false, 1.0, -0.5, 0.25),
            resp(false, 1.0, 0.0, 0.25),
            resp(false, 1.0, 0.5, 0.25),
        ];
        assert_eq!(estimate_ability(&responses, 0.0), -2.0);
    }

    #[test]
    fn degenerate_estimates_are_capped() {
        let hard = vec![resp(true, 1.0, 2.8, 0.2)];
        assert_eq!(estimate_ability(&hard, 0.0), 3.0);
        let easy = vec![resp(false, 1.0, -2.2, 0.2)];
        assert_eq!(estimate_ability(&easy, 0.0), -3.0);
    }

    #[test]
    fn mixed_history_converges_inside_bounds() {
        let est = AbilityEstimator::default().estimate(&mixed_history(), 0.0);
        assert_eq!(est.method, EstimationMethod::NewtonRaphson);
        assert!(est.converged);
        assert!(est.iterations >= 1);
        assert!((est.theta - 0.3523).abs() < 0.01, "got {}", est.theta);
    }

    #[test]
    fn extreme_start_reaches_same_estimate() {
        let history = mixed_history();
        let from_zero = estimate_ability(&history, 0.0);
        let from_ceiling = estimate_ability(&history, 2.9);
        let from_floor = estimate_ability(&history, -2.9);
        assert!((from_zero - from_ceiling).abs() < 0.01);
        assert!((from_zero - from_floor).abs() < 0.01);
    }

    #[test]
    fn iteration_cap_is_respected() {
        let est = AbilityEstimator::new(EstimatorConfig {
            max_iterations: 1,
            tolerance: 1e-12,
        })
        .estimate(&mixed_history(), 0.0);
        assert_eq!(est.iterations, 1);
        assert!(!est.converged);
    }

    #[test]
    fn estimate_is_rounded_to_four_places() {
        let theta = estimate_ability(&mixed_history(), 0.0);
        assert_eq!(theta, round_to(theta, 4));
    }

    #[test]
    fn newton_step_is_clipped() {
        let (step, kind) = newton_step(LikelihoodDerivatives {
            first: 10.0,
            second: -1.0,
        });
        assert_eq!(step, MAX_STEP);
        assert_eq!(kind, StepKind::Newton);

        let (step, _) = newton_step(LikelihoodDerivatives {
            first: -0.1,
            second: -1.0,
        });
        assert!((step + 0.1).abs() < 1e-12);
    }

    #[test]
    fn flat_hessian_uses_gradient_direction() {
        let (step, kind) = newton_step(LikelihoodDerivatives {
            first: 0.3,
            second: -0.00001,
        });
        assert_eq!(kind, StepKind::GradientFallback);
        assert_eq!(step, MAX_STEP);

        let (step, _) = newton_step(LikelihoodDerivatives {
            first: -0.3,
            second: 0.0,
        });
        assert_eq!(step, -MAX_STEP);
    }

    #[test]
    fn derivatives_clamp_bad_parameters() {
        // a below the floor and c above the cap must not produce NaN.
        let responses = vec![resp(true, -2.0, 0.0, 0.9), resp(false, 0.0, 1.0, 0.7)];
        let d = LikelihoodDerivatives::at(0.0, &responses);
        assert!(d.first.is_finite());
        assert!(d.second.is_finite());
        assert!(d.second < 0.0);
    }
}
