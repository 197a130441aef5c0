use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use study_core::Clock;
use study_core::model::{FlashcardItem, FlowchartData, NotesItem, QuizQuestion, non_blank};

use super::client::TextGenerator;
use super::{parse, prompt};
use crate::error::GenerationError;

pub const DEFAULT_QUIZ_COUNT: u32 = 5;
pub const MAX_QUIZ_COUNT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Flashcards,
    Notes,
    Quiz,
    Flowchart,
}

impl GenerationKind {
    fn label(self) -> &'static str {
        match self {
            Self::Flashcards => "flashcards",
            Self::Notes => "notes",
            Self::Quiz => "quiz",
            Self::Flowchart => "flowchart",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub kind: GenerationKind,
    /// Quiz only; defaults to `DEFAULT_QUIZ_COUNT`.
    pub count: Option<u32>,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(kind: GenerationKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            count: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "camelCase")]
pub enum GeneratedContent {
    Flashcards(Vec<FlashcardItem>),
    Notes(Vec<NotesItem>),
    Quiz(Vec<QuizQuestion>),
    Flowchart(FlowchartData),
}

/// Flashcards and notes generated from the same source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySet {
    pub flashcards: Vec<FlashcardItem>,
    pub notes: Vec<NotesItem>,
}

/// Prompts the text generator and turns its replies into typed study material.
#[derive(Clone)]
pub struct GenerationService {
    clock: Clock,
    generator: Arc<dyn TextGenerator>,
}

impl GenerationService {
    #[must_use]
    pub fn new(clock: Clock, generator: Arc<dyn TextGenerator>) -> Self {
        Self { clock, generator }
    }

    /// Run one generation request.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::ValidationFailed` for blank text,
    /// `GenerationError::InvalidCount` for an out-of-range quiz count, and
    /// transport or parse errors from the generator reply.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedContent, GenerationError> {
        let GenerationRequest { text, kind, count } = request;
        match kind {
            GenerationKind::Flashcards => self
                .generate_flashcards(&text)
                .await
                .map(GeneratedContent::Flashcards),
            GenerationKind::Notes => self.generate_notes(&text).await.map(GeneratedContent::Notes),
            GenerationKind::Quiz => self
                .generate_quiz(&text, count.unwrap_or(DEFAULT_QUIZ_COUNT))
                .await
                .map(GeneratedContent::Quiz),
            GenerationKind::Flowchart => self
                .generate_flowchart(&text)
                .await
                .map(GeneratedContent::Flowchart),
        }
    }

    /// # Errors
    ///
    /// See [`GenerationService::generate`].
    pub async fn generate_flashcards(
        &self,
        text: &str,
    ) -> Result<Vec<FlashcardItem>, GenerationError> {
        let reply = self
            .complete(GenerationKind::Flashcards, &prompt::flashcards(text), text)
            .await?;
        let cards = parse::parse_flashcards(&reply, self.clock.now())
            .inspect_err(|err| warn!(kind = "flashcards", error = %err, "reply rejected"))?;
        info!(count = cards.len(), "generated flashcards");
        Ok(cards)
    }

    /// # Errors
    ///
    /// See [`GenerationService::generate`].
    pub async fn generate_notes(&self, text: &str) -> Result<Vec<NotesItem>, GenerationError> {
        let reply = self
            .complete(GenerationKind::Notes, &prompt::notes(text), text)
            .await?;
        let notes = parse::parse_notes(&reply, self.clock.now())
            .inspect_err(|err| warn!(kind = "notes", error = %err, "reply rejected"))?;
        info!(count = notes.len(), "generated notes");
        Ok(notes)
    }

    /// # Errors
    ///
    /// See [`GenerationService::generate`].
    pub async fn generate_quiz(
        &self,
        text: &str,
        count: u32,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        if !(1..=MAX_QUIZ_COUNT).contains(&count) {
            return Err(GenerationError::InvalidCount {
                count,
                max: MAX_QUIZ_COUNT,
            });
        }
        let reply = self
            .complete(GenerationKind::Quiz, &prompt::quiz(text, count), text)
            .await?;
        let questions = parse::parse_quiz(&reply, self.clock.now())
            .inspect_err(|err| warn!(kind = "quiz", error = %err, "reply rejected"))?;
        info!(requested = count, count = questions.len(), "generated quiz");
        Ok(questions)
    }

    /// # Errors
    ///
    /// See [`GenerationService::generate`].
    pub async fn generate_flowchart(&self, text: &str) -> Result<FlowchartData, GenerationError> {
        let reply = self
            .complete(GenerationKind::Flowchart, &prompt::flowchart(text), text)
            .await?;
        let chart = parse::parse_flowchart(&reply, text, self.clock.now())
            .inspect_err(|err| warn!(kind = "flowchart", error = %err, "reply rejected"))?;
        info!(id = %chart.id(), "generated flowchart");
        Ok(chart)
    }

    /// Flashcards and notes for the same text, requested concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first failure of either request.
    pub async fn generate_study_set(&self, text: &str) -> Result<StudySet, GenerationError> {
        let (flashcards, notes) =
            tokio::join!(self.generate_flashcards(text), self.generate_notes(text));
        Ok(StudySet {
            flashcards: flashcards?,
            notes: notes?,
        })
    }

    async fn complete(
        &self,
        kind: GenerationKind,
        prompt: &str,
        source: &str,
    ) -> Result<String, GenerationError> {
        non_blank("text", source)?;
        self.generator
            .complete(prompt)
            .await
            .inspect_err(|err| warn!(kind = kind.label(), error = %err, "generation failed"))
    }
}
