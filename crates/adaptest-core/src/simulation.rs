//! Simulated examinees for exercising whole sessions without a learner.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::irt::{clamp_theta, item_probability};
use crate::model::Item;

/// Anything that can answer an item.
pub trait Examinee: Send {
    fn answer(&mut self, item: &Item) -> bool;
}

/// Answers correctly with the 3PL probability at a fixed true ability.
#[derive(Debug, Clone)]
pub struct SimulatedExaminee<R = ChaCha8Rng> {
    true_theta: f64,
    rng: R,
}

impl SimulatedExaminee<ChaCha8Rng> {
    pub fn with_seed(true_theta: f64, seed: u64) -> Self {
        Self::new(true_theta, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> SimulatedExaminee<R> {
    pub fn new(true_theta: f64, rng: R) -> Self {
        Self {
            true_theta: clamp_theta(true_theta),
            rng,
        }
    }

    pub fn true_theta(&self) -> f64 {
        self.true_theta
    }
}

impl<R: Rng + Send> Examinee for SimulatedExaminee<R> {
    fn answer(&mut self, item: &Item) -> bool {
        let p = item_probability(self.true_theta, &item.params);
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemParams;

    #[test]
    fn strong_examinee_answers_easy_items() {
        let item = Item::new("easy", "Spelling", ItemParams::new(2.0, -3.0, 0.0));
        let mut examinee = SimulatedExaminee::with_seed(3.0, 7);
        let correct = (0..200).filter(|_| examinee.answer(&item)).count();
        assert!(correct > 190, "got {correct}");
    }

    #[test]
    fn correct_rate_tracks_probability() {
        let item = Item::new("mid", "Grammar", ItemParams::new(1.0, 0.0, 0.0));
        let mut examinee = SimulatedExaminee::with_seed(0.0, 11);
        let correct = (0..2000).filter(|_| examinee.answer(&item)).count();
        let rate = correct as f64 / 2000.0;
        assert!((rate - 0.5).abs() < 0.06, "got {rate}");
    }

    #[test]
    fn same_seed_same_answers() {
        let item = Item::new("mid", "Grammar", ItemParams::new(1.0, 0.3, 0.2));
        let mut a = SimulatedExaminee::with_seed(0.0, 5);
        let mut b = SimulatedExaminee::with_seed(0.0, 5);
        for _ in 0..50 {
            assert_eq!(a.answer(&item), b.answer(&item));
        }
    }
}
