//! Graph table repository.

use sqlx::Sqlite;

use crate::graph::{Graph, GraphStatus};
use crate::storage::error::{Result, StorageError};

#[derive(sqlx::FromRow)]
struct GraphRow {
    id: String,
    status: String,
    metadata: String,
}

fn status_from_str(s: &str) -> GraphStatus {
    match s {
        "RUNNING" => GraphStatus::Running,
        "SUCCEEDED" => GraphStatus::Succeeded,
        "FAILED" => GraphStatus::Failed,
        "CANCELLED" => GraphStatus::Cancelled,
        _ => GraphStatus::Created,
    }
}

pub struct GraphRepository;

impl GraphRepository {
    /// Every method takes `impl Executor` rather than `&SqlitePool` so callers
    /// can run it either directly against the pool or inside an open
    /// `Transaction`, per the WAL-before-apply contract in `storage::sqlite`.
    pub async fn create(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph: &Graph) -> Result<()> {
        let metadata = serde_json::to_string(&graph.metadata)?;
        sqlx::query(
            "INSERT INTO graphs (id, status, metadata, created_at, updated_at)
             VALUES (?, ?, ?, datetime('now'), datetime('now'))",
        )
        .bind(&graph.id)
        .bind(graph.status.as_str())
        .bind(&metadata)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_status(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        graph_id: &str,
        status: GraphStatus,
    ) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE graphs SET status = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(graph_id)
        .execute(executor)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(StorageError::NotFound(format!("graph {graph_id}")));
        }
        Ok(())
    }

    pub async fn get_status(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str) -> Result<GraphStatus> {
        let row: GraphRow = sqlx::query_as("SELECT * FROM graphs WHERE id = ?")
            .bind(graph_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))?;
        Ok(status_from_str(&row.status))
    }

    pub async fn metadata(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        graph_id: &str,
    ) -> Result<std::collections::HashMap<String, String>> {
        let row: GraphRow = sqlx::query_as("SELECT * FROM graphs WHERE id = ?")
            .bind(graph_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))?;
        Ok(serde_json::from_str(&row.metadata)?)
    }
}
