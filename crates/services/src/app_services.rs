use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::flowchart_service::FlowchartService;
use crate::generation::{GeminiClient, GenerationService, TextGenerator};
use crate::quiz_service::QuizService;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    generation: Arc<GenerationService>,
    quiz: Arc<QuizService>,
    flowcharts: Arc<FlowchartService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the Gemini client
    /// configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::with_storage(
            storage,
            clock,
            Arc::new(GeminiClient::from_env()),
        ))
    }

    /// In-memory storage with a caller-supplied generator.
    #[must_use]
    pub fn in_memory(clock: Clock, generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_storage(Storage::in_memory(), clock, generator)
    }

    #[must_use]
    pub fn with_storage(storage: Storage, clock: Clock, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generation: Arc::new(GenerationService::new(clock, generator)),
            quiz: Arc::new(QuizService::new(clock, Arc::clone(&storage.sessions))),
            flowcharts: Arc::new(FlowchartService::new(Arc::clone(&storage.flowcharts))),
        }
    }

    #[must_use]
    pub fn generation(&self) -> Arc<GenerationService> {
        Arc::clone(&self.generation)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn flowcharts(&self) -> Arc<FlowchartService> {
        Arc::clone(&self.flowcharts)
    }
}
