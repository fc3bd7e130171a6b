//! Content balancing across item categories.

use std::collections::BTreeMap;

use crate::model::{normalize_category, Item, Session};

/// Restricts candidate pools to categories still below their target count.
#[derive(Debug, Clone, Default)]
pub struct ContentBalancer {
    /// Target answered-item count keyed by normalized category.
    targets: BTreeMap<String, u32>,
}

impl ContentBalancer {
    pub fn new<K: AsRef<str>>(targets: impl IntoIterator<Item = (K, u32)>) -> Self {
        let mut normalized = BTreeMap::new();
        for (category, target) in targets {
            *normalized
                .entry(normalize_category(category.as_ref()))
                .or_insert(0) += target;
        }
        Self {
            targets: normalized,
        }
    }

    /// Categories whose answered count in `session` is below target.
    pub fn under_target(&self, session: &Session) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|(category, &target)| session.category_count(category) < target)
            .map(|(category, _)| category.as_str())
            .collect()
    }

    /// Candidates in under-target categories; the full pool if that is empty
    /// or every category has met its target.
    pub fn restrict<'a>(&self, session: &Session, candidates: Vec<&'a Item>) -> Vec<&'a Item> {
        let under = self.under_target(session);
        if under.is_empty() {
            return candidates;
        }

        let restricted: Vec<&'a Item> = candidates
            .iter()
            .copied()
            .filter(|item| under.iter().any(|category| item.in_category(category)))
            .collect();

        if restricted.is_empty() {
            tracing::debug!(
                under_target = ?under,
                "no candidates in under-target categories, using full pool"
            );
            candidates
        } else {
            restricted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemParams, ResponseEvent, SessionKind};

    fn pool() -> Vec<Item> {
        vec![
            Item::new("s1", "Spelling", ItemParams::default()),
            Item::new("s2", "Spelling", ItemParams::default()),
            Item::new("g1", "Grammar", ItemParams::default()),
            Item::new("p1", "Pronunciation", ItemParams::default()),
        ]
    }

    fn answer(session: &mut Session, item_id: &str, category: &str) {
        let event = ResponseEvent {
            session_id: session.id,
            learner_id: session.learner_id.clone(),
            item_id: item_id.into(),
            category: category.into(),
            is_correct: true,
            params: ItemParams::default(),
            theta_before: 0.0,
            theta_after: 0.0,
            recorded_at: chrono::Utc::now(),
        };
        session.apply_response(&event);
    }

    #[test]
    fn restricts_to_under_target_categories() {
        let items = pool();
        let balancer = ContentBalancer::new([("Spelling", 1), ("grammar", 1)]);
        let mut session = Session::new("l1", SessionKind::PreAssessment, 0.0);
        answer(&mut session, "s0", "SPELLING");

        let restricted = balancer.restrict(&session, items.iter().collect());
        let ids: Vec<&str> = restricted.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["g1"]);
    }

    #[test]
    fn falls_back_when_under_target_category_has_no_items() {
        let items = pool();
        let balancer = ContentBalancer::new([("Syntax", 3)]);
        let session = Session::new("l1", SessionKind::PreAssessment, 0.0);
        let restricted = balancer.restrict(&session, items.iter().collect());
        assert_eq!(restricted.len(), items.len());
    }

    #[test]
    fn all_targets_met_keeps_full_pool() {
        let items = pool();
        let balancer = ContentBalancer::new([("Grammar", 1)]);
        let mut session = Session::new("l1", SessionKind::PreAssessment, 0.0);
        answer(&mut session, "g0", "Grammar");
        assert!(balancer.under_target(&session).is_empty());
        assert_eq!(balancer.restrict(&session, items.iter().collect()).len(), 4);
    }

    #[test]
    fn empty_targets_are_a_no_op() {
        let items = pool();
        let balancer = ContentBalancer::default();
        let session = Session::new("l1", SessionKind::PreAssessment, 0.0);
        assert_eq!(balancer.restrict(&session, items.iter().collect()).len(), 4);
    }
}
