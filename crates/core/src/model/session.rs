use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::model::host::{HostError, HostPhase};
use crate::model::ids::{ItemId, ParticipantId, SessionId};
use crate::model::participant::Participant;
use crate::model::question::QuizQuestion;
use crate::model::text::{TextError, non_blank};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error(transparent)]
    Text(#[from] TextError),

    #[error("a quiz session needs at least one question")]
    NoQuestions,

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(ItemId),

    #[error("participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("question not found: {0}")]
    QuestionNotFound(ItemId),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result of a recorded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// The answer this submission replaced, if the question was answered before.
    pub previous: Option<String>,
    pub score: u32,
}

/// A participant's position on the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    /// 1-based.
    pub rank: usize,
    pub score: u32,
    pub total_questions: usize,
}

/// A hosted quiz: a frozen question set plus the roster that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    id: SessionId,
    title: String,
    questions: Vec<QuizQuestion>,
    participants: Vec<Participant>,
    phase: HostPhase,
    created_at: DateTime<Utc>,
}

impl QuizSession {
    /// Create a session with no participants, waiting for the host to start.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError` if the title is blank, `questions` is empty,
    /// or two questions share an id.
    pub fn new(
        id: SessionId,
        title: impl Into<String>,
        questions: Vec<QuizQuestion>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuizSessionError> {
        Self::from_persisted(
            id,
            title,
            questions,
            Vec::new(),
            HostPhase::Created,
            created_at,
        )
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Same validation as `new`.
    pub fn from_persisted(
        id: SessionId,
        title: impl Into<String>,
        questions: Vec<QuizQuestion>,
        participants: Vec<Participant>,
        phase: HostPhase,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuizSessionError> {
        let title = non_blank("title", title)?;
        if questions.is_empty() {
            return Err(QuizSessionError::NoQuestions);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id()) {
                return Err(QuizSessionError::DuplicateQuestion(q.id().clone()));
            }
        }

        Ok(Self {
            id,
            title,
            questions,
            participants,
            phase,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn question(&self, id: &ItemId) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == id)
    }

    /// The question the host currently shows, if the quiz is running or paused.
    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.phase
            .current_index()
            .and_then(|index| self.questions.get(index))
    }

    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        self.phase.progress_percent(self.questions.len())
    }

    /// Appends a participant. Display names are not required to be unique.
    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    /// Record `answer` for a participant. Re-answering a question replaces the
    /// earlier answer; the score always reflects the current answer log.
    ///
    /// # Errors
    ///
    /// Returns `ParticipantNotFound` or `QuestionNotFound` when a lookup misses.
    pub fn submit_answer(
        &mut self,
        participant_id: ParticipantId,
        question_id: &ItemId,
        answer: impl Into<String>,
    ) -> Result<AnswerOutcome, QuizSessionError> {
        let answer = answer.into();
        let question = self
            .questions
            .iter()
            .find(|q| q.id() == question_id)
            .ok_or_else(|| QuizSessionError::QuestionNotFound(question_id.clone()))?;
        let correct = question.is_correct(&answer);

        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.id() == participant_id)
            .ok_or(QuizSessionError::ParticipantNotFound(participant_id))?;
        let previous = participant.record_answer(question_id.clone(), answer, &self.questions);

        Ok(AnswerOutcome {
            correct,
            previous,
            score: participant.score(),
        })
    }

    /// Participants ordered by descending score. Ties keep join order.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<&Participant> {
        let mut ranked: Vec<&Participant> = self.participants.iter().collect();
        // `sort_by` is stable, which keeps join order among equal scores.
        ranked.sort_by(|a, b| b.score().cmp(&a.score()));
        ranked
    }

    /// # Errors
    ///
    /// Returns `ParticipantNotFound` if the participant is not in this session.
    pub fn standing(&self, participant_id: ParticipantId) -> Result<Standing, QuizSessionError> {
        let board = self.leaderboard();
        board
            .iter()
            .position(|p| p.id() == participant_id)
            .map(|index| Standing {
                rank: index + 1,
                score: board[index].score(),
                total_questions: self.questions.len(),
            })
            .ok_or(QuizSessionError::ParticipantNotFound(participant_id))
    }

    /// # Errors
    ///
    /// Returns `QuizSessionError::Host` for an invalid transition.
    pub fn start(&mut self) -> Result<HostPhase, QuizSessionError> {
        self.transition(HostPhase::start)
    }

    /// # Errors
    ///
    /// Returns `QuizSessionError::Host` for an invalid transition.
    pub fn pause(&mut self) -> Result<HostPhase, QuizSessionError> {
        self.transition(HostPhase::pause)
    }

    /// # Errors
    ///
    /// Returns `QuizSessionError::Host` for an invalid transition.
    pub fn next_question(&mut self) -> Result<HostPhase, QuizSessionError> {
        let total = self.questions.len();
        self.transition(|phase| phase.next(total))
    }

    /// # Errors
    ///
    /// Returns `QuizSessionError::Host` for an invalid transition.
    pub fn previous_question(&mut self) -> Result<HostPhase, QuizSessionError> {
        self.transition(HostPhase::previous)
    }

    fn transition(
        &mut self,
        step: impl FnOnce(HostPhase) -> Result<HostPhase, HostError>,
    ) -> Result<HostPhase, QuizSessionError> {
        self.phase = step(self.phase)?;
        Ok(self.phase)
    }
}
