use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::ids::{ItemId, ParticipantId};
use crate::model::question::QuizQuestion;
use crate::model::text::{TextError, non_blank};

/// A player who joined a quiz session.
///
/// `score` always equals the number of logged answers that match their
/// question's correct answer. It is recomputed from the log rather than
/// incremented, so answering the same question twice never counts twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    id: ParticipantId,
    name: String,
    score: u32,
    answers: BTreeMap<ItemId, String>,
    joined_at: DateTime<Utc>,
}

impl Participant {
    /// Creates a participant with no answers and a score of zero.
    ///
    /// # Errors
    ///
    /// Returns `TextError` if `name` is blank.
    pub fn new(
        id: ParticipantId,
        name: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Result<Self, TextError> {
        Ok(Self {
            id,
            name: non_blank("name", name)?,
            score: 0,
            answers: BTreeMap::new(),
            joined_at,
        })
    }

    /// Rehydrate a participant from persisted storage, deriving the score
    /// from the answer log against `questions`.
    ///
    /// # Errors
    ///
    /// Returns `TextError` if `name` is blank.
    pub fn from_persisted(
        id: ParticipantId,
        name: impl Into<String>,
        answers: BTreeMap<ItemId, String>,
        joined_at: DateTime<Utc>,
        questions: &[QuizQuestion],
    ) -> Result<Self, TextError> {
        let mut participant = Self::new(id, name, joined_at)?;
        participant.answers = answers;
        participant.rescore(questions);
        Ok(participant)
    }

    #[must_use]
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<ItemId, String> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &ItemId) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    #[must_use]
    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// Logs `answer` for `question_id`, replacing any earlier answer, and
    /// re-derives the score. Returns the replaced answer, if any.
    pub(crate) fn record_answer(
        &mut self,
        question_id: ItemId,
        answer: String,
        questions: &[QuizQuestion],
    ) -> Option<String> {
        let previous = self.answers.insert(question_id, answer);
        self.rescore(questions);
        previous
    }

    fn rescore(&mut self, questions: &[QuizQuestion]) {
        let correct = self
            .answers
            .iter()
            .filter(|(question_id, answer)| {
                questions
                    .iter()
                    .find(|q| q.id() == *question_id)
                    .is_some_and(|q| q.is_correct(answer))
            })
            .count();
        self.score = u32::try_from(correct).unwrap_or(u32::MAX);
    }
}
