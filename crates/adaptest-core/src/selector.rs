//! Maximum-information item selection with randomized near-tie breaking.
//!
//! Always picking the single most informative item overexposes it for every
//! learner at the same ability. Instead every candidate within
//! `tie_threshold × max information` is eligible and one is drawn uniformly.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::irt::item_information;
use crate::model::Item;

/// Default fraction of the best information that still counts as a tie.
pub const DEFAULT_TIE_THRESHOLD: f64 = 0.95;

/// A candidate paired with its information at the current theta.
#[derive(Debug, Clone, Copy)]
pub struct RankedItem<'a> {
    pub item: &'a Item,
    pub information: f64,
}

/// Picks the next item to administer.
#[derive(Debug, Clone, Copy)]
pub struct ItemSelector {
    tie_threshold: f64,
}

impl Default for ItemSelector {
    fn default() -> Self {
        Self::new(DEFAULT_TIE_THRESHOLD)
    }
}

impl ItemSelector {
    pub fn new(tie_threshold: f64) -> Self {
        Self { tie_threshold }
    }

    pub fn tie_threshold(&self) -> f64 {
        self.tie_threshold
    }

    /// Candidates sorted by information at `theta`, most informative first.
    pub fn rank<'a, I>(&self, theta: f64, candidates: I) -> Vec<RankedItem<'a>>
    where
        I: IntoIterator<Item = &'a Item>,
    {
        let mut ranked: Vec<RankedItem<'a>> = candidates
            .into_iter()
            .map(|item| RankedItem {
                item,
                information: item_information(theta, &item.params),
            })
            .collect();
        ranked.sort_by(|x, y| y.information.total_cmp(&x.information));
        ranked
    }

    /// The near-tie set of an already ranked list.
    pub fn eligible<'r, 'a>(&self, ranked: &'r [RankedItem<'a>]) -> &'r [RankedItem<'a>] {
        let Some(best) = ranked.first() else {
            return ranked;
        };
        let threshold = self.tie_threshold * best.information;
        let cutoff = ranked
            .iter()
            .position(|r| r.information < threshold)
            .unwrap_or(ranked.len());
        &ranked[..cutoff]
    }

    /// Draw uniformly from the near-tie set of a ranked list.
    pub fn select_from_ranked<'a, R>(
        &self,
        ranked: &[RankedItem<'a>],
        rng: &mut R,
    ) -> Option<&'a Item>
    where
        R: Rng + ?Sized,
    {
        self.eligible(ranked).choose(rng).map(|r| r.item)
    }

    /// Next item for `theta`, or `None` when there are no candidates.
    pub fn select_next<'a, I, R>(&self, theta: f64, candidates: I, rng: &mut R) -> Option<&'a Item>
    where
        I: IntoIterator<Item = &'a Item>,
        R: Rng + ?Sized,
    {
        let ranked = self.rank(theta, candidates);
        let chosen = self.select_from_ranked(&ranked, rng);
        if let Some(item) = chosen {
            tracing::debug!(
                theta,
                item = %item.id,
                candidates = ranked.len(),
                eligible = self.eligible(&ranked).len(),
                "selected item"
            );
        }
        chosen
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::model::ItemParams;

    fn item(id: &str, a: f64, b: f64) -> Item {
        Item::new(id, "Grammar", ItemParams::new(a, b, 0.0))
    }

    fn ranked<'a>(items: &'a [Item], infos: &[f64]) -> Vec<RankedItem<'a>> {
        items
            .iter()
            .zip(infos)
            .map(|(item, &information)| RankedItem { item, information })
            .collect()
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pool: Vec<Item> = vec![];
        assert!(ItemSelector::default()
            .select_next(0.0, &pool, &mut rng)
            .is_none());
    }

    #[test]
    fn near_ties_are_all_chosen_and_outlier_never() {
        let items = vec![item("i1", 1.0, 0.0), item("i2", 1.0, 0.0), item("i3", 1.0, 0.0)];
        let list = ranked(&items, &[10.5, 10.0, 9.0]);
        let selector = ItemSelector::default();
        assert_eq!(selector.eligible(&list).len(), 2);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let chosen = selector.select_from_ranked(&list, &mut rng).unwrap();
            *counts.entry(chosen.id.as_str()).or_default() += 1;
        }
        assert!(counts.get("i1").copied().unwrap_or(0) > 0);
        assert!(counts.get("i2").copied().unwrap_or(0) > 0);
        assert_eq!(counts.get("i3"), None);
    }

    #[test]
    fn ranks_by_information_descending() {
        let items = vec![
            item("far", 1.0, 2.5),
            item("near", 1.0, 0.1),
            item("sharp", 2.5, 0.0),
        ];
        let ranked = ItemSelector::default().rank(0.0, &items);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["sharp", "near", "far"]);
    }

    #[test]
    fn selection_is_a_candidate_and_reproducible() {
        let items: Vec<Item> = (0..6)
            .map(|i| item(&format!("i{i}"), 1.2, -1.0 + 0.4 * i as f64))
            .collect();
        let selector = ItemSelector::default();

        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..20 {
            let x = selector.select_next(0.3, &items, &mut a).unwrap();
            let y = selector.select_next(0.3, &items, &mut b).unwrap();
            assert_eq!(x.id, y.id);
            assert!(items.iter().any(|i| i.id == x.id));
        }
    }

    #[test]
    fn threshold_of_one_keeps_only_exact_best() {
        let items = vec![item("i1", 1.0, 0.0), item("i2", 1.0, 0.0)];
        let list = ranked(&items, &[2.0, 1.99]);
        assert_eq!(ItemSelector::new(1.0).eligible(&list).len(), 1);
    }
}
