//! Collaborator traits for the session orchestrator.
//!
//! The math components never touch storage; the orchestrator reads and writes
//! through these narrow async interfaces, implemented by `adaptest-store`.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{Item, LearnerProfile, ResponseEvent, Session};

// ---------------------------------------------------------------------------
// Item bank
// ---------------------------------------------------------------------------

/// Read-only source of calibrated items.
#[async_trait]
pub trait ItemBank: Send + Sync {
    /// All items currently eligible for administration.
    async fn active_items(&self) -> anyhow::Result<Vec<Item>>;

    /// Look up a single item by id, active or not.
    async fn item(&self, item_id: &str) -> anyhow::Result<Option<Item>>;
}

// ---------------------------------------------------------------------------
// Response log
// ---------------------------------------------------------------------------

/// Append-only log of scored responses.
#[async_trait]
pub trait ResponseLog: Send + Sync {
    async fn append(&self, event: &ResponseEvent) -> anyhow::Result<()>;

    /// Responses of one session in the order they were recorded.
    async fn history(&self, session_id: Uuid) -> anyhow::Result<Vec<ResponseEvent>>;

    /// The learner's most recent `limit` responses across all sessions,
    /// oldest first.
    async fn recent_for_learner(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ResponseEvent>>;
}

// ---------------------------------------------------------------------------
// Session and learner stores
// ---------------------------------------------------------------------------

/// Session records with optimistic concurrency.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session. Fails if the id already exists.
    async fn create(&self, session: &Session) -> anyhow::Result<()>;

    async fn load(&self, session_id: Uuid) -> anyhow::Result<Option<Session>>;

    /// Persist `session` if the stored version still equals
    /// `expected_version`, storing it with the version incremented.
    ///
    /// A stale version fails with a wrapped [`CatError::VersionConflict`].
    ///
    /// [`CatError::VersionConflict`]: crate::error::CatError::VersionConflict
    async fn save(&self, session: &Session, expected_version: u64) -> anyhow::Result<Session>;

    /// Every session of a learner, oldest first.
    async fn sessions_for(&self, learner_id: &str) -> anyhow::Result<Vec<Session>>;
}

/// Per-learner persisted ability.
#[async_trait]
pub trait LearnerStore: Send + Sync {
    async fn profile(&self, learner_id: &str) -> anyhow::Result<Option<LearnerProfile>>;

    async fn set_ability(&self, learner_id: &str, ability: f64) -> anyhow::Result<LearnerProfile>;
}

/// The four collaborators an engine needs, usually backed by one store.
#[derive(Clone)]
pub struct CatStores {
    pub items: Arc<dyn ItemBank>,
    pub responses: Arc<dyn ResponseLog>,
    pub sessions: Arc<dyn SessionStore>,
    pub learners: Arc<dyn LearnerStore>,
}

impl CatStores {
    /// Use a single store for every role.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: ItemBank + ResponseLog + SessionStore + LearnerStore + 'static,
    {
        Self {
            items: store.clone(),
            responses: store.clone(),
            sessions: store.clone(),
            learners: store,
        }
    }
}
