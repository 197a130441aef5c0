use std::sync::Arc;

use tracing::info;

use storage::repository::{FlowchartRepository, StorageError};
use study_core::model::{FlowchartData, ItemId};

use crate::error::FlowchartServiceError;
use crate::generation::GenerationService;

/// Saved flowcharts, in the order they were generated.
#[derive(Clone)]
pub struct FlowchartService {
    flowcharts: Arc<dyn FlowchartRepository>,
}

impl FlowchartService {
    #[must_use]
    pub fn new(flowcharts: Arc<dyn FlowchartRepository>) -> Self {
        Self { flowcharts }
    }

    /// # Errors
    ///
    /// Returns `FlowchartServiceError::Storage` (`Conflict` for a reused id).
    pub async fn save(&self, flowchart: &FlowchartData) -> Result<(), FlowchartServiceError> {
        self.flowcharts.append_flowchart(flowchart).await?;
        info!(id = %flowchart.id(), title = flowchart.title(), "flowchart saved");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `FlowchartServiceError::NotFound` if no flowchart has this id.
    pub async fn get(&self, id: &ItemId) -> Result<FlowchartData, FlowchartServiceError> {
        self.flowcharts
            .get_flowchart(id)
            .await?
            .ok_or_else(|| FlowchartServiceError::NotFound(id.clone()))
    }

    /// # Errors
    ///
    /// Returns `FlowchartServiceError::Storage` if repository access fails.
    pub async fn list(&self) -> Result<Vec<FlowchartData>, FlowchartServiceError> {
        Ok(self.flowcharts.list_flowcharts().await?)
    }

    /// Generate a flowchart for `text` and keep it.
    ///
    /// # Errors
    ///
    /// Returns `FlowchartServiceError::Generation` if generation fails and
    /// `FlowchartServiceError::Storage` if the save fails.
    pub async fn generate_and_save(
        &self,
        generation: &GenerationService,
        text: &str,
    ) -> Result<FlowchartData, FlowchartServiceError> {
        let flowchart = generation.generate_flowchart(text).await?;
        self.save(&flowchart).await?;
        Ok(flowchart)
    }
}

impl FlowchartServiceError {
    /// True when a save collided with an existing id.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Conflict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::generation::TextGenerator;
    use async_trait::async_trait;
    use storage::repository::InMemoryRepository;
    use study_core::time::{fixed_clock, fixed_now};

    struct Diagram;

    #[async_trait]
    impl TextGenerator for Diagram {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok(r#"Here is your chart: {"title":"Cells","mermaidCode":"graph TD\n    A[Cell] --> B[Nucleus]"}"#.into())
        }
    }

    #[tokio::test]
    async fn generated_flowcharts_are_saved_and_listed() {
        let service = FlowchartService::new(Arc::new(InMemoryRepository::new()));
        let generation = GenerationService::new(fixed_clock(), Arc::new(Diagram));

        let chart = service
            .generate_and_save(&generation, "cells have a nucleus")
            .await
            .unwrap();
        assert_eq!(chart.mermaid_code(), "graph TD\nA[Cell] --> B[Nucleus]");
        assert_eq!(service.get(chart.id()).await.unwrap(), chart);
        assert_eq!(service.list().await.unwrap(), vec![chart.clone()]);

        // Same clock, same id.
        let err = service
            .generate_and_save(&generation, "cells again")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn missing_flowchart_is_not_found() {
        let service = FlowchartService::new(Arc::new(InMemoryRepository::new()));
        let id = ItemId::synthesize_single("flowchart", fixed_now());
        assert!(matches!(
            service.get(&id).await,
            Err(FlowchartServiceError::NotFound(missing)) if missing == id
        ));
    }
}
