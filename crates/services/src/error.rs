//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::model::{HostError, ItemId, ParticipantId, QuizSessionError, SessionId, TextError};

/// Errors emitted by the generation pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("generation is not configured")]
    Disabled,
    #[error(transparent)]
    ValidationFailed(#[from] TextError),
    #[error("question count must be between 1 and {max}, got {count}")]
    InvalidCount { count: u32, max: u32 },
    #[error("generation request failed with status {0}")]
    UpstreamCallFailed(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("generation returned an empty response")]
    EmptyResponse,
    #[error("unparseable generation response: {reason}")]
    UnparseableResponse { reason: String },
    #[error("generated item {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("generated item {index} is invalid: {source}")]
    InvalidItem {
        index: usize,
        #[source]
        source: study_core::Error,
    },
}

impl GenerationError {
    pub(crate) fn unparseable(reason: impl Into<String>) -> Self {
        Self::UnparseableResponse {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_item(index: usize, source: impl Into<study_core::Error>) -> Self {
        Self::InvalidItem {
            index,
            source: source.into(),
        }
    }
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("quiz session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("participant not found: {0}")]
    ParticipantNotFound(ParticipantId),
    #[error("question not found: {0}")]
    QuestionNotFound(ItemId),
    #[error(transparent)]
    ValidationFailed(study_core::Error),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuizServiceError {
    /// True for the session, participant and question lookup misses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_) | Self::ParticipantNotFound(_) | Self::QuestionNotFound(_)
        )
    }
}

impl From<QuizSessionError> for QuizServiceError {
    fn from(err: QuizSessionError) -> Self {
        match err {
            QuizSessionError::ParticipantNotFound(id) => Self::ParticipantNotFound(id),
            QuizSessionError::QuestionNotFound(id) => Self::QuestionNotFound(id),
            QuizSessionError::Host(host) => Self::Host(host),
            other => Self::ValidationFailed(other.into()),
        }
    }
}

impl From<study_core::Error> for QuizServiceError {
    fn from(err: study_core::Error) -> Self {
        match err {
            study_core::Error::Session(err) => err.into(),
            study_core::Error::Host(host) => Self::Host(host),
            other => Self::ValidationFailed(other),
        }
    }
}

impl From<TextError> for QuizServiceError {
    fn from(err: TextError) -> Self {
        Self::ValidationFailed(err.into())
    }
}

/// Errors emitted by `FlowchartService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowchartServiceError {
    #[error("flowchart not found: {0}")]
    NotFound(ItemId),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
