//! Node table repository.

use sqlx::Sqlite;

use crate::graph::{Node, NodeStatus};
use crate::storage::error::Result;

#[derive(sqlx::FromRow)]
struct NodeRow {
    node_id: String,
    #[sqlx(rename = "type")]
    node_type: String,
    config: String,
    status: String,
    relevance: f64,
    depth: i64,
    retry_count: i64,
    last_error: Option<String>,
}

fn status_from_str(s: &str) -> NodeStatus {
    match s {
        "PENDING" => NodeStatus::Pending,
        "RUNNING" => NodeStatus::Running,
        "RETRYING" => NodeStatus::Retrying,
        "FAILED" => NodeStatus::Failed,
        "CANCELLED" => NodeStatus::Cancelled,
        "BLOCKED" => NodeStatus::Blocked,
        "SUCCEEDED" => NodeStatus::Succeeded,
        _ => NodeStatus::Created,
    }
}

impl TryFrom<NodeRow> for Node {
    type Error = serde_json::Error;

    fn try_from(row: NodeRow) -> std::result::Result<Self, Self::Error> {
        Ok(Node {
            id: row.node_id,
            node_type: row.node_type,
            config: serde_json::from_str(&row.config)?,
            status: status_from_str(&row.status),
            relevance: row.relevance,
            depth: row.depth as u32,
            retry_count: row.retry_count as u32,
            last_error: row.last_error,
        })
    }
}

pub struct NodeRepository;

impl NodeRepository {
    pub async fn create(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str, node: &Node) -> Result<()> {
        let config = serde_json::to_string(&node.config)?;
        sqlx::query(
            "INSERT INTO nodes (graph_id, node_id, type, config, status, relevance, depth, retry_count, last_error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'), datetime('now'))",
        )
        .bind(graph_id)
        .bind(&node.id)
        .bind(&node.node_type)
        .bind(&config)
        .bind(node.status.as_str())
        .bind(node.relevance)
        .bind(node.depth as i64)
        .bind(node.retry_count as i64)
        .bind(&node.last_error)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_status(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        graph_id: &str,
        node_id: &str,
        status: NodeStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE nodes SET status = ?, last_error = ?, updated_at = datetime('now')
             WHERE graph_id = ? AND node_id = ?",
        )
        .bind(status.as_str())
        .bind(last_error)
        .bind(graph_id)
        .bind(node_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_graph(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str) -> Result<Vec<Node>> {
        let rows: Vec<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE graph_id = ?")
            .bind(graph_id)
            .fetch_all(executor)
            .await?;
        rows.into_iter()
            .map(|r| Node::try_from(r).map_err(Into::into))
            .collect()
    }
}
