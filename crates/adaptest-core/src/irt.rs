//! Three-parameter logistic (3PL) response model.
//!
//! P(θ) = c + (1 - c) / (1 + e^(-D·a·(θ - b)))
//!
//! D is 1.0 (plain logistic metric). Existing item calibrations were fitted
//! on that metric, so it must not be switched to the 1.7 normal-ogive
//! approximation without recalibrating the bank.

use std::ops::RangeInclusive;

use crate::model::{ItemParams, MAX_GUESSING};

/// Logistic scaling constant.
pub const SCALING_D: f64 = 1.0;

/// Exponent magnitude beyond which the curve is treated as saturated.
pub const EXPONENT_LIMIT: f64 = 700.0;

/// Information returned for numerically degenerate probabilities.
pub const INFORMATION_FLOOR: f64 = 0.0001;

/// Sentinel SEM meaning "precision undefined" (no items, or no information).
pub const SEM_UNDEFINED: f64 = 999.0;

pub const THETA_MIN: f64 = -3.0;
pub const THETA_MAX: f64 = 3.0;

/// Clamp an ability estimate into [-3, 3].
pub fn clamp_theta(theta: f64) -> f64 {
    theta.clamp(THETA_MIN, THETA_MAX)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Probability of a correct response. Always in [c, 1].
pub fn probability(theta: f64, a: f64, b: f64, c: f64) -> f64 {
    let c = c.clamp(0.0, MAX_GUESSING);
    let exponent = -SCALING_D * a * (theta - b);

    if exponent > EXPONENT_LIMIT {
        return c;
    }
    if exponent < -EXPONENT_LIMIT {
        return 1.0;
    }

    c + (1.0 - c) / (1.0 + exponent.exp())
}

/// Fisher information of an item at `theta`: D²a²(P-c)² / ((1-c)²·P·Q).
///
/// Never zero: degenerate probabilities (P ≤ c, Q ≤ 0, P ≥ 1) and results
/// that underflow return [`INFORMATION_FLOOR`].
pub fn information(theta: f64, a: f64, b: f64, c: f64) -> f64 {
    let c = c.clamp(0.0, MAX_GUESSING);
    let p = probability(theta, a, b, c);
    let q = 1.0 - p;

    if p <= c || q <= 0.0 || p >= 1.0 {
        return INFORMATION_FLOOR;
    }

    let numerator = SCALING_D.powi(2) * a.powi(2) * (p - c).powi(2);
    let denominator = (1.0 - c).powi(2) * p * q;
    let info = numerator / denominator;

    if info > 0.0 && info.is_finite() {
        info
    } else {
        INFORMATION_FLOOR
    }
}

/// [`probability`] for a parameter set.
pub fn item_probability(theta: f64, params: &ItemParams) -> f64 {
    probability(theta, params.a, params.b, params.c)
}

/// [`information`] for a parameter set.
pub fn item_information(theta: f64, params: &ItemParams) -> f64 {
    information(theta, params.a, params.b, params.c)
}

/// Standard error of measurement: 1/√(Σ information), rounded to 4 decimals.
///
/// Returns [`SEM_UNDEFINED`] when `items` is empty or carries no information.
pub fn standard_error<'a>(theta: f64, items: impl IntoIterator<Item = &'a ItemParams>) -> f64 {
    let mut count = 0usize;
    let mut total = 0.0;
    for params in items {
        count += 1;
        total += item_information(theta, params);
    }

    if count == 0 || total <= 0.0 {
        return SEM_UNDEFINED;
    }

    round_to(1.0 / total.sqrt(), 4)
}

/// `true` unless `sem` is the undefined-precision sentinel.
pub fn is_sem_defined(sem: f64) -> bool {
    sem < SEM_UNDEFINED
}

/// Expected number-correct score at `theta`.
pub fn expected_score<'a>(theta: f64, items: impl IntoIterator<Item = &'a ItemParams>) -> f64 {
    items
        .into_iter()
        .map(|params| item_probability(theta, params))
        .sum()
}

/// Marginal reliability at `theta`, in [0, 1].
///
/// (Σ PQ − SEM²) / Σ PQ; zero for fewer than two items.
pub fn reliability(theta: f64, items: &[ItemParams]) -> f64 {
    if items.len() < 2 {
        return 0.0;
    }

    let total_variance: f64 = items
        .iter()
        .map(|params| {
            let p = item_probability(theta, params);
            p * (1.0 - p)
        })
        .sum();

    if total_variance == 0.0 {
        return 0.0;
    }

    let error_variance = standard_error(theta, items).powi(2);
    let true_variance = (total_variance - error_variance).max(0.0);

    (true_variance / total_variance).clamp(0.0, 1.0)
}

/// Difficulty band worth targeting next: θ ± 0.5.
pub fn recommended_difficulty_range(theta: f64) -> RangeInclusive<f64> {
    (theta - 0.5)..=(theta + 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_at_difficulty_is_midpoint() {
        let p = probability(0.0, 1.0, 0.0, 0.0);
        assert!((p - 0.5).abs() < 1e-12);

        let p = probability(1.0, 2.0, 1.0, 0.2);
        assert!((p - 0.6).abs() < 1e-12);
    }

    #[test]
    fn probability_uses_logistic_metric() {
        // θ=0.5, a=1.5, b=0, c=0.25 with D = 1.0.
        let p = probability(0.5, 1.5, 0.0, 0.25);
        assert!((p - 0.7594).abs() < 1e-4, "got {p}");
    }

    #[test]
    fn probability_saturates_without_overflow() {
        assert_eq!(probability(-800.0, 1.0, 0.0, 0.2), 0.2);
        assert_eq!(probability(800.0, 1.0, 0.0, 0.2), 1.0);
        assert_eq!(probability(-1e300, 1.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn probability_clamps_guessing() {
        assert_eq!(probability(-800.0, 1.0, 0.0, 0.9), 0.5);
        assert_eq!(probability(-800.0, 1.0, 0.0, -0.3), 0.0);
    }

    #[test]
    fn information_floor_on_degenerate_probabilities() {
        assert_eq!(information(-800.0, 1.0, 0.0, 0.2), INFORMATION_FLOOR);
        assert_eq!(information(800.0, 1.0, 0.0, 0.2), INFORMATION_FLOOR);
        // P - c underflows to zero for c = 0 far below the difficulty.
        assert!(information(-650.0, 1.0, 0.0, 0.0) > 0.0);
    }

    #[test]
    fn information_at_difficulty() {
        // c = 0, P = Q = 0.5: a²·0.25 / 0.25 = a².
        let info = information(0.0, 1.0, 0.0, 0.0);
        assert!((info - 1.0).abs() < 1e-12);
        let info = information(0.0, 2.0, 0.0, 0.0);
        assert!((info - 4.0).abs() < 1e-12);
    }

    #[test]
    fn standard_error_sentinel_for_empty_input() {
        let items: Vec<ItemParams> = vec![];
        assert_eq!(standard_error(0.0, &items), SEM_UNDEFINED);
        assert!(!is_sem_defined(SEM_UNDEFINED));
    }

    #[test]
    fn standard_error_shrinks_with_more_items() {
        let one = vec![ItemParams::new(1.0, 0.0, 0.0)];
        let four = vec![ItemParams::new(1.0, 0.0, 0.0); 4];
        assert_eq!(standard_error(0.0, &one), 1.0);
        assert_eq!(standard_error(0.0, &four), 0.5);
    }

    #[test]
    fn expected_score_sums_probabilities() {
        let items = vec![ItemParams::new(1.0, 0.0, 0.0); 3];
        assert!((expected_score(0.0, &items) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn reliability_bounds() {
        assert_eq!(reliability(0.0, &[ItemParams::default()]), 0.0);
        let items = vec![ItemParams::new(1.5, 0.0, 0.2); 10];
        let r = reliability(0.0, &items);
        assert!((0.0..=1.0).contains(&r), "got {r}");
    }

    #[test]
    fn difficulty_range_is_centered() {
        let range = recommended_difficulty_range(1.0);
        assert_eq!(*range.start(), 0.5);
        assert_eq!(*range.end(), 1.5);
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(-1.23456, 3), -1.235);
    }
}
