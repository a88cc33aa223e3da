//! Edge table repository.

use sqlx::Sqlite;

use crate::graph::Edge;
use crate::storage::error::Result;

#[derive(sqlx::FromRow)]
struct EdgeRow {
    #[sqlx(rename = "from")]
    from_id: String,
    #[sqlx(rename = "to")]
    to_id: String,
}

pub struct EdgeRepository;

impl EdgeRepository {
    pub async fn create(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str, edge: &Edge) -> Result<()> {
        sqlx::query(
            "INSERT INTO edges (graph_id, \"from\", \"to\", created_at) VALUES (?, ?, ?, datetime('now'))",
        )
        .bind(graph_id)
        .bind(&edge.from)
        .bind(&edge.to)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_graph(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str) -> Result<Vec<Edge>> {
        let rows: Vec<EdgeRow> = sqlx::query_as("SELECT * FROM edges WHERE graph_id = ?")
            .bind(graph_id)
            .fetch_all(executor)
            .await?;
        Ok(rows.into_iter().map(|r| Edge::new(r.from_id, r.to_id)).collect())
    }
}
