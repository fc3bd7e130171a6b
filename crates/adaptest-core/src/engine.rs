//! Session orchestrator.
//!
//! Composes the response model, estimator, selector, content balancer and
//! stopping rule into per-request decisions, reading and writing all state
//! through the collaborator traits.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::ContentBalancer;
use crate::error::CatError;
use crate::estimator::{AbilityEstimator, EstimatorConfig};
use crate::irt::{round_to, standard_error};
use crate::model::{
    AbilityDiagnosis, AbilityLevel, CompletionReason, Item, ResponseEvent, ScoredResponse,
    Session, SessionKind, SessionSummary,
};
use crate::report::SessionReport;
use crate::selector::ItemSelector;
use crate::termination::{StopReason, StoppingRule};
use crate::traits::CatStores;

/// Change in theta beyond which a response gets the stronger feedback message.
pub const FEEDBACK_SHIFT: f64 = 0.2;

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatConfig {
    /// Items that must be answered before precision can end a session.
    pub min_items: u32,
    /// Hard cap on items per session.
    pub max_items: u32,
    /// SEM at or below which a session may stop.
    pub target_sem: f64,
    /// Near-tie fraction of the best information.
    pub tie_threshold: f64,
    pub max_iterations: u32,
    pub tolerance: f64,
    /// Target answered-item count per content category.
    pub category_targets: BTreeMap<String, u32>,
    /// Responses considered when recalibrating a learner.
    pub recalibration_window: usize,
}

impl Default for CatConfig {
    fn default() -> Self {
        let category_targets = ["Spelling", "Grammar", "Pronunciation", "Syntax"]
            .into_iter()
            .map(|c| (c.to_string(), 5))
            .collect();
        Self {
            min_items: 20,
            max_items: 20,
            target_sem: 0.25,
            tie_threshold: crate::selector::DEFAULT_TIE_THRESHOLD,
            max_iterations: 50,
            tolerance: 0.001,
            category_targets,
            recalibration_window: 50,
        }
    }
}

impl CatConfig {
    pub fn validate(&self) -> Result<(), CatError> {
        if self.max_items == 0 {
            return Err(CatError::InvalidConfig("max_items must be at least 1".into()));
        }
        if self.min_items > self.max_items {
            return Err(CatError::InvalidConfig(format!(
                "min_items ({}) exceeds max_items ({})",
                self.min_items, self.max_items
            )));
        }
        if self.target_sem.is_nan() || self.target_sem <= 0.0 {
            return Err(CatError::InvalidConfig("target_sem must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.tie_threshold) || self.tie_threshold == 0.0 {
            return Err(CatError::InvalidConfig(format!(
                "tie_threshold must be in (0, 1], got {}",
                self.tie_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(CatError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            return Err(CatError::InvalidConfig("tolerance must be positive".into()));
        }
        Ok(())
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }

    pub fn stopping_rule(&self) -> StoppingRule {
        StoppingRule::new(self.min_items, self.max_items, self.target_sem)
    }
}

/// An item handed to the learner, with progress bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOffer {
    pub session_id: Uuid,
    pub item: Item,
    /// Running theta, 3 decimals.
    pub current_theta: f64,
    pub items_completed: u32,
    pub items_remaining: u32,
    /// Completed share of `max_items`, 1 decimal.
    pub progress_pct: f64,
}

/// Answer to a "next item" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextStep {
    Item(ItemOffer),
    Complete(SessionSummary),
}

/// Learner-facing message for a scored response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    ChallengeMastered,
    Correct,
    EasierNext,
    KeepGoing,
}

impl Feedback {
    pub fn for_response(is_correct: bool, theta_change: f64) -> Self {
        match (is_correct, theta_change) {
            (true, change) if change > FEEDBACK_SHIFT => Feedback::ChallengeMastered,
            (true, _) => Feedback::Correct,
            (false, change) if change < -FEEDBACK_SHIFT => Feedback::EasierNext,
            (false, _) => Feedback::KeepGoing,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Feedback::ChallengeMastered => "Excellent! You're ready for more challenging items.",
            Feedback::Correct => "Correct! Well done.",
            Feedback::EasierNext => "Not quite. The next item will be a little easier.",
            Feedback::KeepGoing => "Not quite, keep going!",
        }
    }
}

/// Result of recording one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    pub session_id: Uuid,
    pub item_id: String,
    pub is_correct: bool,
    pub previous_theta: f64,
    pub new_theta: f64,
    /// 3 decimals.
    pub theta_change: f64,
    pub level: AbilityLevel,
    /// 3 decimals; the undefined sentinel is preserved.
    pub sem: f64,
    pub total_responses: u32,
    pub feedback: Feedback,
}

/// Result of re-estimating a learner's ability from recent history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recalibration {
    pub learner_id: String,
    pub previous_ability: f64,
    pub new_ability: f64,
    pub change: f64,
    pub level: AbilityLevel,
    pub sem: f64,
    pub responses_analyzed: usize,
}

/// Session lifecycle hooks.
pub trait SessionObserver: Send + Sync {
    fn on_session_started(&self, session: &Session);
    fn on_item_offered(&self, offer: &ItemOffer);
    fn on_response_recorded(&self, outcome: &ResponseOutcome);
    fn on_session_completed(&self, session: &Session, summary: &SessionSummary);
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_session_started(&self, _: &Session) {}
    fn on_item_offered(&self, _: &ItemOffer) {}
    fn on_response_recorded(&self, _: &ResponseOutcome) {}
    fn on_session_completed(&self, _: &Session, _: &SessionSummary) {}
}

/// The adaptive testing engine.
///
/// Callers serialize requests per session; concurrent writers are detected
/// by the session store's version check and surface as
/// [`CatError::VersionConflict`].
pub struct CatEngine<R = ChaCha8Rng> {
    stores: CatStores,
    config: CatConfig,
    estimator: AbilityEstimator,
    selector: ItemSelector,
    balancer: ContentBalancer,
    rule: StoppingRule,
    rng: Mutex<R>,
    observer: Arc<dyn SessionObserver>,
}

impl CatEngine<ChaCha8Rng> {
    /// Engine with an entropy-seeded generator.
    pub fn new(stores: CatStores, config: CatConfig) -> Result<Self, CatError> {
        Self::with_rng(stores, config, ChaCha8Rng::from_entropy())
    }

    /// Engine whose item draws are reproducible from `seed`.
    pub fn with_seed(stores: CatStores, config: CatConfig, seed: u64) -> Result<Self, CatError> {
        Self::with_rng(stores, config, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> CatEngine<R> {
    pub fn with_rng(stores: CatStores, config: CatConfig, rng: R) -> Result<Self, CatError> {
        config.validate()?;
        Ok(Self {
            estimator: AbilityEstimator::new(config.estimator_config()),
            selector: ItemSelector::new(config.tie_threshold),
            balancer: ContentBalancer::new(
                config.category_targets.iter().map(|(k, v)| (k.as_str(), *v)),
            ),
            rule: config.stopping_rule(),
            stores,
            config,
            rng: Mutex::new(rng),
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &CatConfig {
        &self.config
    }

    pub fn stores(&self) -> &CatStores {
        &self.stores
    }

    /// Open a new Active session.
    ///
    /// Without an explicit start value the learner's stored ability is
    /// carried over, or 0.0 for a new learner.
    pub async fn start_session(
        &self,
        learner_id: &str,
        kind: SessionKind,
        initial_theta: Option<f64>,
    ) -> Result<Session, CatError> {
        let theta = match initial_theta {
            Some(theta) => theta,
            None => self
                .stores
                .learners
                .profile(learner_id)
                .await?
                .map(|p| p.current_ability)
                .unwrap_or(0.0),
        };

        let session = Session::new(learner_id, kind, theta);
        self.stores.sessions.create(&session).await?;

        tracing::info!(
            session = %session.id,
            learner = learner_id,
            %kind,
            theta = session.initial_theta,
            "session started"
        );
        self.observer.on_session_started(&session);
        Ok(session)
    }

    /// Decide whether the session is over and, if not, which item comes next.
    pub async fn next_item(&self, session_id: Uuid) -> Result<NextStep, CatError> {
        let mut session = self.load_session(session_id).await?;

        if !session.is_active() {
            let summary = match session.summary.clone() {
                Some(summary) => summary,
                None => {
                    let history = self.stores.responses.history(session_id).await?;
                    summarize(&session, &history, CompletionReason::ManuallyCompleted)
                }
            };
            return Ok(NextStep::Complete(summary));
        }

        let history = self.stores.responses.history(session_id).await?;
        apply_pending(&mut session, &history);
        let items = self.stores.items.active_items().await?;
        let candidates: Vec<&Item> = items
            .iter()
            .filter(|item| item.active && !session.has_administered(&item.id))
            .collect();

        if candidates.is_empty() {
            let summary = self
                .finalize(session, &history, CompletionReason::ItemPoolExhausted)
                .await?;
            return Ok(NextStep::Complete(summary));
        }

        let answered = session.items_answered();
        if answered >= self.config.min_items {
            let sem = standard_error(session.current_theta, history.iter().map(|e| &e.params));
            let decision = self.rule.evaluate(answered, sem);
            tracing::debug!(
                session = %session_id,
                answered,
                sem,
                reason = %decision.reason,
                "stopping rule evaluated"
            );
            if decision.stop {
                let reason = match decision.reason {
                    StopReason::TargetPrecisionAchieved => CompletionReason::TargetPrecisionAchieved,
                    _ => CompletionReason::MaximumItemsReached,
                };
                let summary = self.finalize(session, &history, reason).await?;
                return Ok(NextStep::Complete(summary));
            }
        }
        if answered >= self.config.max_items {
            let summary = self
                .finalize(session, &history, CompletionReason::MaximumItemsReached)
                .await?;
            return Ok(NextStep::Complete(summary));
        }

        let remaining_candidates = candidates.len() as u32;
        let pool = self.balancer.restrict(&session, candidates);
        let chosen = {
            let mut rng = self.lock_rng();
            self.selector
                .select_next(session.current_theta, pool.iter().copied(), &mut *rng)
                .cloned()
        };
        let Some(item) = chosen else {
            let summary = self
                .finalize(session, &history, CompletionReason::ItemPoolExhausted)
                .await?;
            return Ok(NextStep::Complete(summary));
        };

        session.last_offered = Some(item.id.clone());
        let expected = session.version;
        self.stores.sessions.save(&session, expected).await?;

        let offer = ItemOffer {
            session_id,
            current_theta: round_to(session.current_theta, 3),
            items_completed: answered,
            items_remaining: self
                .config
                .max_items
                .saturating_sub(answered)
                .min(remaining_candidates),
            progress_pct: round_to(
                f64::from(answered) / f64::from(self.config.max_items) * 100.0,
                1,
            ),
            item,
        };
        self.observer.on_item_offered(&offer);
        Ok(NextStep::Item(offer))
    }

    /// Score a response and re-estimate ability over the session history.
    ///
    /// The event is appended to the response log before the session is
    /// saved. If the save fails, re-supplying the same response replays the
    /// logged event instead of appending it twice; the logged outcome wins.
    pub async fn record_response(
        &self,
        session_id: Uuid,
        item_id: &str,
        is_correct: bool,
    ) -> Result<ResponseOutcome, CatError> {
        let mut session = self.load_session(session_id).await?;
        if !session.is_active() {
            return Err(CatError::SessionCompleted(session_id));
        }
        if session.has_administered(item_id) {
            return Err(CatError::ItemAlreadyAdministered {
                session_id,
                item_id: item_id.to_string(),
            });
        }

        let history = self.stores.responses.history(session_id).await?;
        apply_pending(&mut session, history.iter().filter(|e| e.item_id != item_id));
        let pending = history.iter().find(|e| e.item_id == item_id).cloned();

        let (event, scored) = match pending {
            Some(event) => {
                if event.is_correct != is_correct {
                    tracing::warn!(
                        session = %session_id,
                        item = item_id,
                        logged = event.is_correct,
                        supplied = is_correct,
                        "replaying logged response with a different outcome"
                    );
                }
                let scored: Vec<ScoredResponse> =
                    history.iter().map(ResponseEvent::scored).collect();
                (event, scored)
            }
            None => {
                let item = self
                    .stores
                    .items
                    .item(item_id)
                    .await?
                    .ok_or_else(|| CatError::ItemNotFound(item_id.to_string()))?;

                let scored: Vec<ScoredResponse> = history
                    .iter()
                    .map(ResponseEvent::scored)
                    .chain(std::iter::once(ScoredResponse::new(is_correct, item.params)))
                    .collect();
                let estimate = self.estimator.estimate(&scored, session.current_theta);

                let event = ResponseEvent {
                    session_id,
                    learner_id: session.learner_id.clone(),
                    item_id: item.id.clone(),
                    category: item.category.clone(),
                    is_correct,
                    params: item.params,
                    theta_before: session.current_theta,
                    theta_after: estimate.theta,
                    recorded_at: chrono::Utc::now(),
                };
                self.stores.responses.append(&event).await?;

                tracing::debug!(
                    session = %session_id,
                    item = item_id,
                    is_correct,
                    theta_before = event.theta_before,
                    theta_after = event.theta_after,
                    method = ?estimate.method,
                    "response recorded"
                );
                (event, scored)
            }
        };

        session.apply_response(&event);
        let expected = session.version;
        self.stores.sessions.save(&session, expected).await?;

        let is_correct = event.is_correct;
        let theta_before = event.theta_before;
        let theta_after = event.theta_after;
        let theta_change = round_to(theta_after - theta_before, 3);
        let sem = standard_error(theta_after, scored.iter().map(|r| &r.params));
        let outcome = ResponseOutcome {
            session_id,
            item_id: event.item_id,
            is_correct,
            previous_theta: theta_before,
            new_theta: theta_after,
            theta_change,
            level: AbilityLevel::classify(theta_after),
            sem: round_to(sem, 3),
            total_responses: scored.len() as u32,
            feedback: Feedback::for_response(is_correct, theta_change),
        };
        self.observer.on_response_recorded(&outcome);
        Ok(outcome)
    }

    /// Finalize a session on request. Completed sessions return their summary.
    pub async fn complete_session(&self, session_id: Uuid) -> Result<SessionSummary, CatError> {
        let mut session = self.load_session(session_id).await?;
        let history = self.stores.responses.history(session_id).await?;
        if let Some(summary) = session.summary.clone() {
            return Ok(summary);
        }
        apply_pending(&mut session, &history);
        self.finalize(session, &history, CompletionReason::ManuallyCompleted)
            .await
    }

    /// Re-estimate a learner's ability from their most recent responses.
    pub async fn recalibrate_learner(&self, learner_id: &str) -> Result<Recalibration, CatError> {
        let recent = self
            .stores
            .responses
            .recent_for_learner(learner_id, self.config.recalibration_window)
            .await?;
        if recent.is_empty() {
            return Err(CatError::NoResponses(learner_id.to_string()));
        }

        let previous = self.current_ability(learner_id).await?;
        let scored: Vec<ScoredResponse> = recent.iter().map(ResponseEvent::scored).collect();
        let estimate = self.estimator.estimate(&scored, previous);
        self.stores
            .learners
            .set_ability(learner_id, estimate.theta)
            .await?;

        let sem = standard_error(estimate.theta, scored.iter().map(|r| &r.params));
        tracing::info!(
            learner = learner_id,
            previous,
            new = estimate.theta,
            responses = scored.len(),
            "learner recalibrated"
        );

        Ok(Recalibration {
            learner_id: learner_id.to_string(),
            previous_ability: previous,
            new_ability: estimate.theta,
            change: round_to(estimate.theta - previous, 3),
            level: AbilityLevel::classify(estimate.theta),
            sem: round_to(sem, 3),
            responses_analyzed: scored.len(),
        })
    }

    /// Set a learner's ability back to 0.0, returning the previous value.
    pub async fn reset_learner(&self, learner_id: &str) -> Result<f64, CatError> {
        let previous = self.current_ability(learner_id).await?;
        self.stores.learners.set_ability(learner_id, 0.0).await?;
        tracing::info!(learner = learner_id, previous, "learner ability reset");
        Ok(previous)
    }

    pub async fn diagnose_learner(&self, learner_id: &str) -> Result<AbilityDiagnosis, CatError> {
        let ability = self.current_ability(learner_id).await?;
        Ok(AbilityDiagnosis::of(ability))
    }

    /// Snapshot of a session and its full response history.
    pub async fn session_report(&self, session_id: Uuid) -> Result<SessionReport, CatError> {
        let session = self.load_session(session_id).await?;
        let history = self.stores.responses.history(session_id).await?;
        Ok(SessionReport::new(&session, history))
    }

    async fn load_session(&self, session_id: Uuid) -> Result<Session, CatError> {
        self.stores
            .sessions
            .load(session_id)
            .await?
            .ok_or(CatError::SessionNotFound(session_id))
    }

    async fn current_ability(&self, learner_id: &str) -> Result<f64, CatError> {
        Ok(self
            .stores
            .learners
            .profile(learner_id)
            .await?
            .map(|p| p.current_ability)
            .unwrap_or(0.0))
    }

    async fn finalize(
        &self,
        mut session: Session,
        history: &[ResponseEvent],
        reason: CompletionReason,
    ) -> Result<SessionSummary, CatError> {
        let summary = summarize(&session, history, reason);
        session.complete(summary.clone());

        self.stores
            .learners
            .set_ability(&session.learner_id, summary.final_theta)
            .await?;
        let expected = session.version;
        let saved = self.stores.sessions.save(&session, expected).await?;

        tracing::info!(
            session = %saved.id,
            learner = %saved.learner_id,
            %reason,
            items = summary.total_items,
            theta = summary.final_theta,
            sem = summary.sem,
            "session completed"
        );
        self.observer.on_session_completed(&saved, &summary);
        Ok(summary)
    }

    fn lock_rng(&self) -> MutexGuard<'_, R> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Apply logged responses whose session save never landed.
fn apply_pending<'a>(
    session: &mut Session,
    history: impl IntoIterator<Item = &'a ResponseEvent>,
) {
    for event in history {
        if !session.has_administered(&event.item_id) {
            tracing::warn!(
                session = %session.id,
                item = %event.item_id,
                "applying logged response missing from the session"
            );
            session.apply_response(event);
        }
    }
}

/// Final statistics for a session at its current state.
pub fn summarize(
    session: &Session,
    history: &[ResponseEvent],
    reason: CompletionReason,
) -> SessionSummary {
    let total_items = session.items_answered();
    let correct_count = session.correct_count;
    let accuracy_pct = if total_items == 0 {
        0.0
    } else {
        round_to(f64::from(correct_count) / f64::from(total_items) * 100.0, 2)
    };
    let final_theta = session.current_theta;

    SessionSummary {
        total_items,
        correct_count,
        accuracy_pct,
        final_theta,
        sem: standard_error(final_theta, history.iter().map(|e| &e.params)),
        level: AbilityLevel::classify(final_theta),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_items, 20);
        assert_eq!(config.category_targets.len(), 4);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad = [
            CatConfig {
                min_items: 10,
                max_items: 5,
                ..CatConfig::default()
            },
            CatConfig {
                max_items: 0,
                min_items: 0,
                ..CatConfig::default()
            },
            CatConfig {
                target_sem: 0.0,
                ..CatConfig::default()
            },
            CatConfig {
                tie_threshold: 1.5,
                ..CatConfig::default()
            },
            CatConfig {
                tolerance: -1.0,
                ..CatConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(CatError::InvalidConfig(_))));
        }
    }

    #[test]
    fn config_from_partial_toml() {
        let config: CatConfig = toml::from_str("min_items = 5\nmax_items = 12").unwrap();
        assert_eq!(config.min_items, 5);
        assert_eq!(config.max_items, 12);
        assert_eq!(config.target_sem, 0.25);
        assert_eq!(config.tie_threshold, 0.95);
    }

    #[test]
    fn feedback_thresholds() {
        assert_eq!(Feedback::for_response(true, 0.21), Feedback::ChallengeMastered);
        assert_eq!(Feedback::for_response(true, 0.2), Feedback::Correct);
        assert_eq!(Feedback::for_response(false, -0.21), Feedback::EasierNext);
        assert_eq!(Feedback::for_response(false, -0.2), Feedback::KeepGoing);
        assert!(!Feedback::Correct.message().is_empty());
    }

    #[test]
    fn summary_of_empty_session() {
        let session = Session::new("l1", SessionKind::PreAssessment, 0.4);
        let summary = summarize(&session, &[], CompletionReason::ItemPoolExhausted);
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.accuracy_pct, 0.0);
        assert_eq!(summary.sem, crate::irt::SEM_UNDEFINED);
        assert_eq!(summary.level, AbilityLevel::Basic);
    }
}
