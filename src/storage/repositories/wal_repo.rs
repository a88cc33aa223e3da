//! Write-ahead-log table repository.

use sqlx::Sqlite;

use crate::storage::error::Result;
use crate::storage::wal::{Mutation, WalEntry};

#[derive(sqlx::FromRow)]
struct WalRow {
    id: i64,
    graph_id: String,
    mutation_type: String,
    payload: String,
    sequence_num: i64,
    replayed: bool,
}

impl TryFrom<WalRow> for WalEntry {
    type Error = serde_json::Error;

    fn try_from(row: WalRow) -> std::result::Result<Self, Self::Error> {
        // mutation_type is redundant with Mutation's internally-tagged
        // discriminant; it exists so the table is queryable by kind without
        // deserializing the payload.
        let _ = &row.mutation_type;
        Ok(WalEntry {
            id: row.id,
            graph_id: row.graph_id,
            sequence_num: row.sequence_num,
            mutation: serde_json::from_str(&row.payload)?,
            replayed: row.replayed,
        })
    }
}

pub struct WalRepository;

impl WalRepository {
    pub async fn append(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        graph_id: &str,
        sequence_num: i64,
        mutation: &Mutation,
    ) -> Result<i64> {
        let mutation_type = mutation_type_name(mutation);
        let payload = serde_json::to_string(mutation)?;
        let id = sqlx::query(
            "INSERT INTO wal_log (graph_id, mutation_type, payload, sequence_num, created_at, replayed)
             VALUES (?, ?, ?, ?, datetime('now'), 0)",
        )
        .bind(graph_id)
        .bind(mutation_type)
        .bind(&payload)
        .bind(sequence_num)
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn unreplayed(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str) -> Result<Vec<WalEntry>> {
        let rows: Vec<WalRow> = sqlx::query_as(
            "SELECT * FROM wal_log WHERE graph_id = ? AND replayed = 0 ORDER BY sequence_num ASC",
        )
        .bind(graph_id)
        .fetch_all(executor)
        .await?;
        rows.into_iter().map(|r| WalEntry::try_from(r).map_err(Into::into)).collect()
    }

    pub async fn since(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        graph_id: &str,
        after_seq: i64,
    ) -> Result<Vec<WalEntry>> {
        let rows: Vec<WalRow> = sqlx::query_as(
            "SELECT * FROM wal_log WHERE graph_id = ? AND sequence_num > ? ORDER BY sequence_num ASC",
        )
        .bind(graph_id)
        .bind(after_seq)
        .fetch_all(executor)
        .await?;
        rows.into_iter().map(|r| WalEntry::try_from(r).map_err(Into::into)).collect()
    }

    pub async fn mark_replayed(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str, upto_seq: i64) -> Result<()> {
        sqlx::query("UPDATE wal_log SET replayed = 1 WHERE graph_id = ? AND sequence_num <= ?")
            .bind(graph_id)
            .bind(upto_seq)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn max_sequence(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str) -> Result<i64> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(sequence_num) FROM wal_log WHERE graph_id = ?")
            .bind(graph_id)
            .fetch_one(executor)
            .await?;
        Ok(row.0.unwrap_or(0))
    }

    pub async fn count_unreplayed(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM wal_log WHERE graph_id = ? AND replayed = 0",
        )
        .bind(graph_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    pub async fn prune_replayed_below(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        graph_id: &str,
        below_seq: i64,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM wal_log WHERE graph_id = ? AND replayed = 1 AND sequence_num < ?",
        )
        .bind(graph_id)
        .bind(below_seq)
        .execute(executor)
        .await?;
        Ok(())
    }
}

fn mutation_type_name(mutation: &Mutation) -> &'static str {
    match mutation {
        Mutation::CreateGraph { .. } => "CREATE_GRAPH",
        Mutation::UpdateGraphStatus { .. } => "UPDATE_GRAPH_STATUS",
        Mutation::AddNode { .. } => "ADD_NODE",
        Mutation::UpdateNodeStatus { .. } => "UPDATE_NODE_STATUS",
        Mutation::AddEdge { .. } => "ADD_EDGE",
        Mutation::SignalReceived { .. } => "SIGNAL_RECEIVED",
    }
}
