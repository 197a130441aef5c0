//! Turns free-text model replies into typed records.
//!
//! Replies are expected to embed one JSON array (or, for flowcharts, one
//! object). Extraction tries the whole reply, then a fenced ```json block,
//! then the first-open/last-close bracket span.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use study_core::model::{FlashcardItem, FlowchartData, ItemId, NotesItem, QuizQuestion};

use crate::error::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonShape {
    Array,
    Object,
}

impl JsonShape {
    fn brackets(self) -> (char, char) {
        match self {
            Self::Array => ('[', ']'),
            Self::Object => ('{', '}'),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Accepts `value` if it already has this shape. Arrays may also arrive
    /// wrapped in a single-field object such as `{"flashcards": [...]}`.
    fn accept(self, value: Value) -> Option<Value> {
        match (self, value) {
            (Self::Array, Value::Array(items)) => Some(Value::Array(items)),
            (Self::Array, Value::Object(map)) if map.len() == 1 => {
                map.into_iter().next().and_then(|(_, inner)| match inner {
                    Value::Array(items) => Some(Value::Array(items)),
                    _ => None,
                })
            }
            (Self::Object, Value::Object(map)) => Some(Value::Object(map)),
            _ => None,
        }
    }
}

pub(crate) fn extract_json(reply: &str, shape: JsonShape) -> Result<Value, GenerationError> {
    let trimmed = reply.trim();
    if let Some(value) = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| shape.accept(v))
    {
        return Ok(value);
    }

    if let Some(value) = fenced_block(trimmed)
        .and_then(|block| serde_json::from_str::<Value>(block).ok())
        .and_then(|v| shape.accept(v))
    {
        return Ok(value);
    }

    let (open, close) = shape.brackets();
    let span = match (trimmed.find(open), trimmed.rfind(close)) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(GenerationError::unparseable(format!(
                "no JSON {} found in reply",
                shape.name()
            )));
        }
    };
    let value: Value = serde_json::from_str(span)
        .map_err(|err| GenerationError::unparseable(format!("invalid JSON: {err}")))?;
    shape.accept(value).ok_or_else(|| {
        GenerationError::unparseable(format!("expected a JSON {}", shape.name()))
    })
}

/// Body of the first ```` ``` ```` fence, with an optional `json` tag.
fn fenced_block(reply: &str) -> Option<&str> {
    let start = reply.find("```")?;
    let rest = &reply[start + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn items<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, GenerationError> {
    let Value::Array(raw) = value else {
        return Err(GenerationError::unparseable("expected a JSON array"));
    };
    if raw.is_empty() {
        return Err(GenerationError::unparseable("reply contained no items"));
    }
    raw.into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|err| {
                GenerationError::unparseable(format!("item {index} has the wrong shape: {err}"))
            })
        })
        .collect()
}

fn required<T>(value: Option<T>, index: usize, field: &'static str) -> Result<T, GenerationError> {
    value.ok_or(GenerationError::MissingField { index, field })
}

#[derive(Debug, Deserialize)]
struct RawFlashcard {
    question: Option<String>,
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNote {
    title: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuizQuestion {
    question: Option<String>,
    options: Option<Vec<String>>,
    correct_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFlowchart {
    title: Option<String>,
    mermaid_code: Option<String>,
}

pub(crate) fn parse_flashcards(
    reply: &str,
    at: DateTime<Utc>,
) -> Result<Vec<FlashcardItem>, GenerationError> {
    let raw: Vec<RawFlashcard> = items(extract_json(reply, JsonShape::Array)?)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, card)| {
            FlashcardItem::new(
                ItemId::synthesize("card", at, index),
                required(card.question, index, "question")?,
                required(card.answer, index, "answer")?,
            )
            .map_err(|err| GenerationError::invalid_item(index, err))
        })
        .collect()
}

pub(crate) fn parse_notes(
    reply: &str,
    at: DateTime<Utc>,
) -> Result<Vec<NotesItem>, GenerationError> {
    let raw: Vec<RawNote> = items(extract_json(reply, JsonShape::Array)?)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, note)| {
            NotesItem::new(
                ItemId::synthesize("note", at, index),
                required(note.title, index, "title")?,
                required(note.content, index, "content")?,
            )
            .map_err(|err| GenerationError::invalid_item(index, err))
        })
        .collect()
}

pub(crate) fn parse_quiz(
    reply: &str,
    at: DateTime<Utc>,
) -> Result<Vec<QuizQuestion>, GenerationError> {
    let raw: Vec<RawQuizQuestion> = items(extract_json(reply, JsonShape::Array)?)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, question)| {
            QuizQuestion::new(
                ItemId::synthesize("quiz", at, index),
                required(question.question, index, "question")?,
                required(question.options, index, "options")?,
                required(question.correct_answer, index, "correctAnswer")?,
            )
            .map_err(|err| GenerationError::invalid_item(index, err))
        })
        .collect()
}

/// `content` is the source text the diagram was generated from.
pub(crate) fn parse_flowchart(
    reply: &str,
    content: &str,
    at: DateTime<Utc>,
) -> Result<FlowchartData, GenerationError> {
    let value = extract_json(reply, JsonShape::Object)?;
    let raw: RawFlowchart = serde_json::from_value(value).map_err(|err| {
        GenerationError::unparseable(format!("flowchart has the wrong shape: {err}"))
    })?;

    let title = required(raw.title, 0, "title")?;
    let mermaid_code = clean_mermaid(&required(raw.mermaid_code, 0, "mermaidCode")?);
    FlowchartData::new(
        ItemId::synthesize_single("flowchart", at),
        title,
        mermaid_code,
        content,
        at,
    )
    .map_err(|err| GenerationError::invalid_item(0, err))
}

static LABEL_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s+\(").expect("static pattern"));
static LABEL_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\)\n").expect("static pattern"));
static LINE_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s+").expect("static pattern"));

/// Repairs labels the model wrapped onto their own line and strips indentation.
pub(crate) fn clean_mermaid(code: &str) -> String {
    let code = LABEL_OPEN.replace_all(code, "[");
    let code = LABEL_CLOSE.replace_all(&code, "]\n");
    let code = LINE_INDENT.replace_all(&code, "\n");
    code.trim().to_string()
}
