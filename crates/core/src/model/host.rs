use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
    #[error("quiz has not been started")]
    NotStarted,

    #[error("quiz is already running")]
    AlreadyActive,

    #[error("quiz is not running")]
    NotActive,

    #[error("quiz is already completed")]
    Completed,
}

/// Where the host is in a quiz session.
///
/// ```text
/// Created -> Active{0} -> Active{1} -> ... -> Completed
///               ^  |
///               |  v
///            Paused{i}
/// ```
///
/// `previous` is the only backward move and stops at index 0. Nothing leaves
/// `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum HostPhase {
    #[default]
    Created,
    Active {
        index: usize,
    },
    Paused {
        index: usize,
    },
    Completed,
}

impl HostPhase {
    /// Starts a fresh quiz at the first question, or resumes a paused one.
    ///
    /// # Errors
    ///
    /// Returns `HostError::AlreadyActive` or `HostError::Completed`.
    pub fn start(self) -> Result<Self, HostError> {
        match self {
            HostPhase::Created => Ok(HostPhase::Active { index: 0 }),
            HostPhase::Paused { index } => Ok(HostPhase::Active { index }),
            HostPhase::Active { .. } => Err(HostError::AlreadyActive),
            HostPhase::Completed => Err(HostError::Completed),
        }
    }

    /// # Errors
    ///
    /// Returns `HostError::NotActive` unless the quiz is running.
    pub fn pause(self) -> Result<Self, HostError> {
        match self {
            HostPhase::Active { index } => Ok(HostPhase::Paused { index }),
            _ => Err(HostError::NotActive),
        }
    }

    /// Moves to the next of `total` questions, completing after the last one.
    /// A paused quiz stays paused.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotStarted` or `HostError::Completed`.
    pub fn next(self, total: usize) -> Result<Self, HostError> {
        match self {
            HostPhase::Active { index } if index + 1 < total => {
                Ok(HostPhase::Active { index: index + 1 })
            }
            HostPhase::Paused { index } if index + 1 < total => {
                Ok(HostPhase::Paused { index: index + 1 })
            }
            HostPhase::Active { .. } | HostPhase::Paused { .. } => Ok(HostPhase::Completed),
            HostPhase::Created => Err(HostError::NotStarted),
            HostPhase::Completed => Err(HostError::Completed),
        }
    }

    /// # Errors
    ///
    /// Returns `HostError::NotStarted` or `HostError::Completed`.
    pub fn previous(self) -> Result<Self, HostError> {
        match self {
            HostPhase::Active { index } => Ok(HostPhase::Active {
                index: index.saturating_sub(1),
            }),
            HostPhase::Paused { index } => Ok(HostPhase::Paused {
                index: index.saturating_sub(1),
            }),
            HostPhase::Created => Err(HostError::NotStarted),
            HostPhase::Completed => Err(HostError::Completed),
        }
    }

    /// Index of the question on screen, if the quiz is running or paused.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match self {
            HostPhase::Active { index } | HostPhase::Paused { index } => Some(*index),
            HostPhase::Created | HostPhase::Completed => None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, HostPhase::Completed)
    }

    /// Share of the quiz shown so far, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self, total: usize) -> f64 {
        match self {
            HostPhase::Created => 0.0,
            HostPhase::Completed => 100.0,
            HostPhase::Active { index } | HostPhase::Paused { index } => {
                if total == 0 {
                    return 0.0;
                }
                ((index + 1) as f64 / total as f64) * 100.0
            }
        }
    }

    /// Storage label for the phase; the index is kept separately.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            HostPhase::Created => "created",
            HostPhase::Active { .. } => "active",
            HostPhase::Paused { .. } => "paused",
            HostPhase::Completed => "completed",
        }
    }

    /// Inverse of `label` plus `current_index`.
    #[must_use]
    pub fn from_label(label: &str, index: Option<usize>) -> Option<Self> {
        match (label, index) {
            ("created", None) => Some(HostPhase::Created),
            ("active", Some(index)) => Some(HostPhase::Active { index }),
            ("paused", Some(index)) => Some(HostPhase::Paused { index }),
            ("completed", None) => Some(HostPhase::Completed),
            _ => None,
        }
    }
}
