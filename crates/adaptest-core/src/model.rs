//! Core data model types for adaptest.
//!
//! Items are immutable calibration data owned by an item bank. Response
//! events are append-only. Sessions are mutated only by the orchestrator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lower bound applied to item discrimination before use.
pub const MIN_DISCRIMINATION: f64 = 0.1;

/// Upper bound applied to the guessing parameter before use.
pub const MAX_GUESSING: f64 = 0.5;

/// 3PL calibration parameters of one item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemParams {
    /// Discrimination.
    #[serde(default = "default_discrimination")]
    pub a: f64,
    /// Difficulty.
    #[serde(default)]
    pub b: f64,
    /// Guessing floor.
    #[serde(default = "default_guessing")]
    pub c: f64,
}

fn default_discrimination() -> f64 {
    1.0
}

fn default_guessing() -> f64 {
    0.25
}

impl Default for ItemParams {
    fn default() -> Self {
        Self {
            a: default_discrimination(),
            b: 0.0,
            c: default_guessing(),
        }
    }
}

impl ItemParams {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Floor `a` at 0.1 and clamp `c` into [0, 0.5].
    pub fn sanitized(&self) -> Self {
        Self {
            a: self.a.max(MIN_DISCRIMINATION),
            b: self.b,
            c: self.c.clamp(0.0, MAX_GUESSING),
        }
    }

    /// Whether [`sanitized`](Self::sanitized) leaves these parameters unchanged.
    pub fn is_in_range(&self) -> bool {
        self.a >= MIN_DISCRIMINATION && (0.0..=MAX_GUESSING).contains(&self.c)
    }
}

/// A calibrated test item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the item bank.
    pub id: String,
    /// Content category used for balancing (e.g. "Spelling").
    pub category: String,
    /// IRT parameters.
    #[serde(flatten)]
    pub params: ItemParams,
    /// Inactive items are never offered.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Optional prompt text shown to the learner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Item {
    pub fn new(id: impl Into<String>, category: impl Into<String>, params: ItemParams) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            params,
            active: true,
            prompt: None,
        }
    }

    /// Case-insensitive, whitespace-trimmed category comparison.
    pub fn in_category(&self, category: &str) -> bool {
        normalize_category(&self.category) == normalize_category(category)
    }
}

/// Canonical form of a category tag for counting and matching.
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

/// A named collection of items loaded from an item-bank file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemCatalog {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl ItemCatalog {
    pub fn active_items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|i| i.active)
    }
}

/// Minimal response record consumed by the ability estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredResponse {
    pub is_correct: bool,
    #[serde(flatten)]
    pub params: ItemParams,
}

impl ScoredResponse {
    pub fn new(is_correct: bool, params: ItemParams) -> Self {
        Self { is_correct, params }
    }
}

/// One recorded answer. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub session_id: Uuid,
    pub learner_id: String,
    pub item_id: String,
    pub category: String,
    pub is_correct: bool,
    pub params: ItemParams,
    /// Ability estimate in effect before this response was scored.
    pub theta_before: f64,
    /// Ability estimate after re-estimation over the history including this response.
    pub theta_after: f64,
    pub recorded_at: DateTime<Utc>,
}

impl ResponseEvent {
    pub fn scored(&self) -> ScoredResponse {
        ScoredResponse::new(self.is_correct, self.params)
    }
}

/// Coarse ability classification derived from fixed cut points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbilityLevel {
    BelowBasic,
    Basic,
    Proficient,
    Advanced,
}

impl AbilityLevel {
    /// Cut points at -1.0, 0.5 and 1.5; each lower bound is inclusive.
    pub fn classify(theta: f64) -> Self {
        if theta < -1.0 {
            AbilityLevel::BelowBasic
        } else if theta < 0.5 {
            AbilityLevel::Basic
        } else if theta < 1.5 {
            AbilityLevel::Proficient
        } else {
            AbilityLevel::Advanced
        }
    }

    /// Ordinal rank, 1 (Below Basic) through 4 (Advanced).
    pub fn rank(&self) -> i32 {
        match self {
            AbilityLevel::BelowBasic => 1,
            AbilityLevel::Basic => 2,
            AbilityLevel::Proficient => 3,
            AbilityLevel::Advanced => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AbilityLevel::BelowBasic => "Below Basic",
            AbilityLevel::Basic => "Basic",
            AbilityLevel::Proficient => "Proficient",
            AbilityLevel::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for AbilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which assessment a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionKind {
    PreAssessment,
    PostAssessment,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::PreAssessment => write!(f, "pre-assessment"),
            SessionKind::PostAssessment => write!(f, "post-assessment"),
        }
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "pre" | "pre-assessment" | "preassessment" => Ok(SessionKind::PreAssessment),
            "post" | "post-assessment" | "postassessment" => Ok(SessionKind::PostAssessment),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Completed,
}

/// Why a session completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    ItemPoolExhausted,
    MaximumItemsReached,
    TargetPrecisionAchieved,
    ManuallyCompleted,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionReason::ItemPoolExhausted => write!(f, "no more items available"),
            CompletionReason::MaximumItemsReached => write!(f, "maximum items reached"),
            CompletionReason::TargetPrecisionAchieved => write!(f, "target precision achieved"),
            CompletionReason::ManuallyCompleted => write!(f, "completed on request"),
        }
    }
}

/// Final statistics computed once, when a session completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_items: u32,
    pub correct_count: u32,
    /// Percentage in [0, 100], rounded to 2 decimals.
    pub accuracy_pct: f64,
    pub final_theta: f64,
    /// Standard error at the final theta; `SEM_UNDEFINED` when not measurable.
    pub sem: f64,
    pub level: AbilityLevel,
    pub reason: CompletionReason,
}

/// One learner's assessment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub learner_id: String,
    pub kind: SessionKind,
    pub state: SessionState,
    pub initial_theta: f64,
    /// Running ability estimate.
    pub current_theta: f64,
    /// Item ids in the order they were answered.
    pub administered: Vec<String>,
    /// Answered items per normalized category.
    #[serde(default)]
    pub category_counts: BTreeMap<String, u32>,
    pub correct_count: u32,
    /// Last item handed out by a "next item" request.
    #[serde(default)]
    pub last_offered: Option<String>,
    /// Incremented on every save; used for optimistic concurrency.
    pub version: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<SessionSummary>,
}

impl Session {
    pub fn new(learner_id: impl Into<String>, kind: SessionKind, initial_theta: f64) -> Self {
        let theta = crate::irt::clamp_theta(initial_theta);
        Self {
            id: Uuid::new_v4(),
            learner_id: learner_id.into(),
            kind,
            state: SessionState::Active,
            initial_theta: theta,
            current_theta: theta,
            administered: Vec::new(),
            category_counts: BTreeMap::new(),
            correct_count: 0,
            last_offered: None,
            version: 0,
            started_at: Utc::now(),
            completed_at: None,
            summary: None,
        }
    }

    pub fn items_answered(&self) -> u32 {
        self.administered.len() as u32
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn has_administered(&self, item_id: &str) -> bool {
        self.administered.iter().any(|id| id == item_id)
    }

    /// Count of answered items in `category` (case-insensitive).
    pub fn category_count(&self, category: &str) -> u32 {
        self.category_counts
            .get(&normalize_category(category))
            .copied()
            .unwrap_or(0)
    }

    /// Fold a newly scored response into the running state.
    pub(crate) fn apply_response(&mut self, event: &ResponseEvent) {
        self.administered.push(event.item_id.clone());
        *self
            .category_counts
            .entry(normalize_category(&event.category))
            .or_insert(0) += 1;
        if event.is_correct {
            self.correct_count += 1;
        }
        self.current_theta = event.theta_after;
        if self.last_offered.as_deref() == Some(event.item_id.as_str()) {
            self.last_offered = None;
        }
    }

    pub(crate) fn complete(&mut self, summary: SessionSummary) {
        self.current_theta = summary.final_theta;
        self.summary = Some(summary);
        self.state = SessionState::Completed;
        self.last_offered = None;
        self.completed_at = Some(Utc::now());
    }
}

/// A learner's persisted ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub learner_id: String,
    pub current_ability: f64,
    pub updated_at: DateTime<Utc>,
}

impl LearnerProfile {
    pub fn new(learner_id: impl Into<String>, ability: f64) -> Self {
        Self {
            learner_id: learner_id.into(),
            current_ability: crate::irt::clamp_theta(ability),
            updated_at: Utc::now(),
        }
    }

    pub fn diagnose(&self) -> AbilityDiagnosis {
        AbilityDiagnosis::of(self.current_ability)
    }
}

/// Flags for abilities stuck at or near the edges of the scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityDiagnosis {
    pub current_ability: f64,
    pub at_ceiling: bool,
    pub at_floor: bool,
    /// Starting a session here would trigger the estimator's extreme-start clamp.
    pub needs_reset: bool,
}

impl AbilityDiagnosis {
    pub fn of(theta: f64) -> Self {
        Self {
            current_ability: theta,
            at_ceiling: theta >= crate::irt::THETA_MAX,
            at_floor: theta <= crate::irt::THETA_MIN,
            needs_reset: theta.abs() >= crate::estimator::EXTREME_START,
        }
    }
}
