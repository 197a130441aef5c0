use serde::Serialize;

use crate::model::ids::ItemId;
use crate::model::text::{TextError, non_blank};

/// A generated question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardItem {
    id: ItemId,
    question: String,
    answer: String,
}

impl FlashcardItem {
    /// # Errors
    ///
    /// Returns `TextError` if the question or answer is blank.
    pub fn new(
        id: ItemId,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<Self, TextError> {
        Ok(Self {
            id,
            question: non_blank("question", question)?,
            answer: non_blank("answer", answer)?,
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
    pub fn answer(&self) -> &str {
        &self.answer
    }
}

/// A generated summary note covering one topic of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotesItem {
    id: ItemId,
    title: String,
    content: String,
}

impl NotesItem {
    /// # Errors
    ///
    /// Returns `TextError` if the title or content is blank.
    pub fn new(
        id: ItemId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, TextError> {
        Ok(Self {
            id,
            title: non_blank("title", title)?,
            content: non_blank("content", content)?,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn flashcard_fails_if_answer_blank() {
        let err = FlashcardItem::new(ItemId::synthesize("card", fixed_now(), 0), "Q", "  ")
            .unwrap_err();
        assert_eq!(err, TextError::Empty { field: "answer" });
    }

    #[test]
    fn note_serializes_with_id() {
        let note = NotesItem::new(
            ItemId::synthesize("note", fixed_now(), 1),
            "Light reactions",
            "Happen in the thylakoid membrane.",
        )
        .unwrap();
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["id"], "note-1700000000000-1");
        assert_eq!(json["title"], "Light reactions");
    }
}
