use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_core::model::{FlowchartData, ItemId, QuizSession, SessionId};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Rejected(study_core::Error),
}

/// Change applied to a stored session by `SessionRepository::modify_session`.
pub type SessionMutation<'a> =
    dyn FnMut(&mut QuizSession) -> Result<(), study_core::Error> + Send + 'a;

/// Repository contract for quiz sessions and their rosters.
///
/// Questions are written once by `insert_session`; `modify_session` only
/// changes the host phase and the participant roster.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a freshly created session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a session with the same id exists.
    async fn insert_session(&self, session: &QuizSession) -> Result<(), StorageError>;

    /// Fetch a session by ID.
    ///
    /// Returns `Ok(None)` when the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<QuizSession>, StorageError>;

    /// Reload the session, apply `mutate` and store the result as one atomic
    /// step, returning what was stored. Writers in other processes sharing
    /// the same database are serialized too. `mutate` runs once on success;
    /// when it fails nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session was never inserted and
    /// `StorageError::Rejected` with the error `mutate` returned.
    async fn modify_session(
        &self,
        id: SessionId,
        mutate: &mut SessionMutation<'_>,
    ) -> Result<QuizSession, StorageError>;

    /// List sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn list_sessions(&self, limit: u32) -> Result<Vec<QuizSession>, StorageError>;
}

/// Append-only store of generated flowcharts.
#[async_trait]
pub trait FlowchartRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a flowchart with the same id exists.
    async fn append_flowchart(&self, flowchart: &FlowchartData) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn get_flowchart(&self, id: &ItemId) -> Result<Option<FlowchartData>, StorageError>;

    /// All flowcharts in the order they were saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn list_flowcharts(&self) -> Result<Vec<FlowchartData>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, QuizSession>>>,
    flowcharts: Arc<Mutex<Vec<FlowchartData>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        if guard.contains_key(&session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<QuizSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn modify_session(
        &self,
        id: SessionId,
        mutate: &mut SessionMutation<'_>,
    ) -> Result<QuizSession, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let slot = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        let mut session = slot.clone();
        mutate(&mut session).map_err(StorageError::Rejected)?;
        *slot = session.clone();
        Ok(session)
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<QuizSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut sessions: Vec<QuizSession> = guard.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().to_string().cmp(&a.id().to_string()))
        });
        sessions.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(sessions)
    }
}

#[async_trait]
impl FlowchartRepository for InMemoryRepository {
    async fn append_flowchart(&self, flowchart: &FlowchartData) -> Result<(), StorageError> {
        let mut guard = self.flowcharts.lock().map_err(poisoned)?;
        if guard.iter().any(|f| f.id() == flowchart.id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(flowchart.clone());
        Ok(())
    }

    async fn get_flowchart(&self, id: &ItemId) -> Result<Option<FlowchartData>, StorageError> {
        let guard = self.flowcharts.lock().map_err(poisoned)?;
        Ok(guard.iter().find(|f| f.id() == id).cloned())
    }

    async fn list_flowcharts(&self) -> Result<Vec<FlowchartData>, StorageError> {
        let guard = self.flowcharts.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub flowcharts: Arc<dyn FlowchartRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let flowcharts: Arc<dyn FlowchartRepository> = Arc::new(repo);
        Self {
            sessions,
            flowcharts,
        }
    }
}
