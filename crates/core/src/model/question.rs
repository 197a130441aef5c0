use serde::Serialize;
use thiserror::Error;

use crate::model::ids::ItemId;
use crate::model::text::{TextError, non_blank};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizQuestionError {
    #[error(transparent)]
    Text(#[from] TextError),

    #[error("question has no options")]
    NoOptions,

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct answer {answer:?} is not one of the options")]
    CorrectAnswerNotInOptions { answer: String },
}

/// A multiple-choice question. `correct_answer` is always one of `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    id: ItemId,
    question: String,
    options: Vec<String>,
    correct_answer: String,
}

impl QuizQuestion {
    /// # Errors
    ///
    /// Returns `QuizQuestionError` if the question text is blank, there are no
    /// options, an option is blank, or `correct_answer` is not exactly one of
    /// the options.
    pub fn new(
        id: ItemId,
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
    ) -> Result<Self, QuizQuestionError> {
        let question = non_blank("question", question)?;
        if options.is_empty() {
            return Err(QuizQuestionError::NoOptions);
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuizQuestionError::EmptyOption { index });
        }
        let correct_answer = correct_answer.into();
        if !options.contains(&correct_answer) {
            return Err(QuizQuestionError::CorrectAnswerNotInOptions {
                answer: correct_answer,
            });
        }

        Ok(Self {
            id,
            question,
            options,
            correct_answer,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    /// Exact string comparison; case and whitespace are significant.
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        answer == self.correct_answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn options() -> Vec<String> {
        vec!["Mitochondria".into(), "Chloroplast".into(), "Nucleus".into()]
    }

    fn id() -> ItemId {
        ItemId::synthesize("quiz", fixed_now(), 0)
    }

    #[test]
    fn rejects_answer_outside_options() {
        let err = QuizQuestion::new(id(), "Where?", options(), "Ribosome").unwrap_err();
        assert!(matches!(
            err,
            QuizQuestionError::CorrectAnswerNotInOptions { .. }
        ));
    }

    #[test]
    fn rejects_blank_option() {
        let mut opts = options();
        opts.push(" ".into());
        let err = QuizQuestion::new(id(), "Where?", opts, "Chloroplast").unwrap_err();
        assert_eq!(err, QuizQuestionError::EmptyOption { index: 3 });
    }

    #[test]
    fn rejects_empty_options() {
        let err = QuizQuestion::new(id(), "Where?", Vec::new(), "Chloroplast").unwrap_err();
        assert_eq!(err, QuizQuestionError::NoOptions);
    }

    #[test]
    fn correctness_is_exact_match() {
        let q = QuizQuestion::new(id(), "Where?", options(), "Chloroplast").unwrap();
        assert!(q.is_correct("Chloroplast"));
        assert!(!q.is_correct("chloroplast"));
        assert!(!q.is_correct("Chloroplast "));
    }

    #[test]
    fn serializes_correct_answer_in_camel_case() {
        let q = QuizQuestion::new(id(), "Where?", options(), "Chloroplast").unwrap();
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["correctAnswer"], "Chloroplast");
        assert_eq!(json["options"].as_array().unwrap().len(), 3);
    }
}
