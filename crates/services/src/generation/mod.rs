mod client;
mod parse;
mod prompt;
mod service;

pub use client::{GeminiClient, GenerationConfig, TextGenerator};
pub use service::{
    DEFAULT_QUIZ_COUNT, GeneratedContent, GenerationKind, GenerationRequest, GenerationService,
    MAX_QUIZ_COUNT, StudySet,
};
