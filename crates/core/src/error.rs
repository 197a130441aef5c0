use thiserror::Error;

use crate::model::{HostError, QuizQuestionError, QuizSessionError, TextError};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Text(#[from] TextError),
    #[error(transparent)]
    Question(#[from] QuizQuestionError),
    #[error(transparent)]
    Session(#[from] QuizSessionError),
    #[error(transparent)]
    Host(#[from] HostError),
}
