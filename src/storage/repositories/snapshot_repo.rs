//! Snapshot table repository.

use sqlx::Sqlite;

use crate::storage::error::Result;

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    sequence_num: i64,
    data: Vec<u8>,
}

pub struct SnapshotRepository;

impl SnapshotRepository {
    pub async fn upsert(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
        graph_id: &str,
        sequence_num: i64,
        data: &[u8],
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO snapshots (graph_id, sequence_num, data, created_at)
             VALUES (?, ?, ?, datetime('now'))
             ON CONFLICT(graph_id) DO UPDATE SET sequence_num = excluded.sequence_num, data = excluded.data, created_at = excluded.created_at",
        )
        .bind(graph_id)
        .bind(sequence_num)
        .bind(data)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn load(executor: impl sqlx::Executor<'_, Database = Sqlite>, graph_id: &str) -> Result<Option<(i64, Vec<u8>)>> {
        let row: Option<SnapshotRow> = sqlx::query_as("SELECT * FROM snapshots WHERE graph_id = ?")
            .bind(graph_id)
            .fetch_optional(executor)
            .await?;
        Ok(row.map(|r| (r.sequence_num, r.data)))
    }
}
