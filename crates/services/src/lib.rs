#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod events;
pub mod flowchart_service;
pub mod generation;
pub mod quiz_service;

pub use study_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, FlowchartServiceError, GenerationError, QuizServiceError};
pub use events::{SessionEvent, SessionEvents, SessionSubscription};
pub use flowchart_service::FlowchartService;
pub use generation::{
    GeminiClient, GeneratedContent, GenerationConfig, GenerationKind, GenerationRequest,
    GenerationService, StudySet, TextGenerator,
};
pub use quiz_service::QuizService;
