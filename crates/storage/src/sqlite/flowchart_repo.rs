use study_core::model::{FlowchartData, ItemId};

use super::SqliteRepository;
use super::mapping::{conn, map_flowchart_row, write_err};
use crate::repository::{FlowchartRepository, StorageError};

#[async_trait::async_trait]
impl FlowchartRepository for SqliteRepository {
    async fn append_flowchart(&self, flowchart: &FlowchartData) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO flowcharts (id, title, mermaid_code, content, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(flowchart.id().as_str())
        .bind(flowchart.title())
        .bind(flowchart.mermaid_code())
        .bind(flowchart.content())
        .bind(flowchart.created_at())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn get_flowchart(&self, id: &ItemId) -> Result<Option<FlowchartData>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, title, mermaid_code, content, created_at
                FROM flowcharts
                WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_flowchart_row).transpose()
    }

    async fn list_flowcharts(&self) -> Result<Vec<FlowchartData>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, title, mermaid_code, content, created_at
                FROM flowcharts
                ORDER BY seq ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_flowchart_row).collect()
    }
}
