//! SQLite-backed `Storage`: pool creation, migrations, and health checks in
//! the shape of this codebase's `DatabaseConnection`, with the `Storage`
//! trait's methods delegating to the per-table repositories.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use async_trait::async_trait;

use crate::graph::{Edge, Graph, GraphStatus, Node, NodeStatus};

use super::error::Result;
use super::repositories::{EdgeRepository, GraphRepository, NodeRepository, SnapshotRepository, WalRepository};
use super::wal::{Mutation, RecoveredGraphState, WalEntry};
use super::{Storage, SNAPSHOT_PRUNE_MARGIN, SNAPSHOT_WAL_THRESHOLD};

/// Pool wrapper plus migrations, mirroring the orchestrator's own
/// `DatabaseConnection` but scoped to this engine's schema.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_graph(&self, graph: &Graph) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        WalRepository::append(&mut *tx, &graph.id, 1, &Mutation::CreateGraph { graph: graph.clone() }).await?;
        GraphRepository::create(&mut *tx, graph).await?;
        for node in &graph.nodes {
            NodeRepository::create(&mut *tx, &graph.id, node).await?;
        }
        for edge in &graph.edges {
            EdgeRepository::create(&mut *tx, &graph.id, edge).await?;
        }
        tx.commit().await?;
        Ok(1)
    }

    async fn load_graph(&self, graph_id: &str) -> Result<Graph> {
        let status = GraphRepository::get_status(&self.pool, graph_id).await?;
        let metadata = GraphRepository::metadata(&self.pool, graph_id).await?;
        let nodes = NodeRepository::list_for_graph(&self.pool, graph_id).await?;
        let edges = EdgeRepository::list_for_graph(&self.pool, graph_id).await?;
        Ok(Graph {
            id: graph_id.to_string(),
            status,
            nodes,
            edges,
            metadata,
        })
    }

    async fn update_graph_status(&self, graph_id: &str, status: GraphStatus) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let seq = WalRepository::max_sequence(&mut *tx, graph_id).await? + 1;
        WalRepository::append(&mut *tx, graph_id, seq, &Mutation::UpdateGraphStatus { status }).await?;
        GraphRepository::update_status(&mut *tx, graph_id, status).await?;
        tx.commit().await?;
        Ok(seq)
    }

    async fn add_node(&self, graph_id: &str, node: &Node) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let seq = WalRepository::max_sequence(&mut *tx, graph_id).await? + 1;
        WalRepository::append(&mut *tx, graph_id, seq, &Mutation::AddNode { node: node.clone() }).await?;
        NodeRepository::create(&mut *tx, graph_id, node).await?;
        tx.commit().await?;
        Ok(seq)
    }

    async fn update_node_status(
        &self,
        graph_id: &str,
        node_id: &str,
        status: NodeStatus,
        last_error: Option<String>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let seq = WalRepository::max_sequence(&mut *tx, graph_id).await? + 1;
        WalRepository::append(
            &mut *tx,
            graph_id,
            seq,
            &Mutation::UpdateNodeStatus {
                node_id: node_id.to_string(),
                status,
                last_error: last_error.clone(),
            },
        )
        .await?;
        NodeRepository::update_status(&mut *tx, graph_id, node_id, status, last_error.as_deref()).await?;
        tx.commit().await?;
        Ok(seq)
    }

    async fn add_edge(&self, graph_id: &str, edge: &Edge) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let seq = WalRepository::max_sequence(&mut *tx, graph_id).await? + 1;
        WalRepository::append(&mut *tx, graph_id, seq, &Mutation::AddEdge { edge: edge.clone() }).await?;
        EdgeRepository::create(&mut *tx, graph_id, edge).await?;
        tx.commit().await?;
        Ok(seq)
    }

    async fn record_signal(&self, graph_id: &str, entity: &str, source_node_id: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let seq = WalRepository::max_sequence(&mut *tx, graph_id).await? + 1;
        WalRepository::append(
            &mut *tx,
            graph_id,
            seq,
            &Mutation::SignalReceived {
                entity: entity.to_string(),
                source_node_id: source_node_id.to_string(),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(seq)
    }

    async fn get_unreplayed_wal(&self, graph_id: &str) -> Result<Vec<WalEntry>> {
        WalRepository::unreplayed(&self.pool, graph_id).await
    }

    async fn mark_wal_replayed(&self, graph_id: &str, upto_seq: i64) -> Result<()> {
        WalRepository::mark_replayed(&self.pool, graph_id, upto_seq).await
    }

    async fn count_unreplayed_wal(&self, graph_id: &str) -> Result<i64> {
        WalRepository::count_unreplayed(&self.pool, graph_id).await
    }

    async fn save_snapshot(&self, graph_id: &str, sequence_num: i64, data: Vec<u8>) -> Result<()> {
        SnapshotRepository::upsert(&self.pool, graph_id, sequence_num, &data).await
    }

    async fn load_snapshot(&self, graph_id: &str) -> Result<Option<(i64, Vec<u8>)>> {
        SnapshotRepository::load(&self.pool, graph_id).await
    }

    async fn recover_graph(&self, graph_id: &str) -> Result<RecoveredGraphState> {
        let mut state = RecoveredGraphState::default();
        if let Some((seq, data)) = SnapshotRepository::load(&self.pool, graph_id).await? {
            let graph: Graph = serde_json::from_slice(&data)?;
            state.nodes_by_id = graph.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
            state.edges = graph.edges.clone();
            state.graph = Some(graph);
            state.last_sequence = seq;
        }

        let entries = WalRepository::since(&self.pool, graph_id, state.last_sequence).await?;
        for entry in &entries {
            state.apply(entry);
        }
        Ok(state)
    }

    async fn maybe_snapshot(&self, graph_id: &str) -> Result<()> {
        let unreplayed = WalRepository::count_unreplayed(&self.pool, graph_id).await?;
        if unreplayed < SNAPSHOT_WAL_THRESHOLD {
            return Ok(());
        }
        let graph = self.load_graph(graph_id).await?;
        let seq = WalRepository::max_sequence(&self.pool, graph_id).await?;
        let data = serde_json::to_vec(&graph)?;
        SnapshotRepository::upsert(&self.pool, graph_id, seq, &data).await?;
        WalRepository::mark_replayed(&self.pool, graph_id, seq).await?;
        WalRepository::prune_replayed_below(&self.pool, graph_id, seq - SNAPSHOT_PRUNE_MARGIN).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    async fn memory_storage() -> SqliteStorage {
        SqliteStorage::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_load_round_trip() {
        let store = memory_storage().await;
        let graph = Graph::new("g1", "goal");
        store.create_graph(&graph).await.unwrap();
        let loaded = store.load_graph("g1").await.unwrap();
        assert_eq!(loaded.id, "g1");
        assert_eq!(loaded.goal(), "goal");
    }

    #[tokio::test]
    async fn node_and_edge_persist() {
        let store = memory_storage().await;
        store.create_graph(&Graph::new("g1", "goal")).await.unwrap();
        store.add_node("g1", &Node::new("a", "researcher")).await.unwrap();
        store.add_node("g1", &Node::new("b", "critic")).await.unwrap();
        store.add_edge("g1", &Edge::new("a", "b")).await.unwrap();

        let graph = store.load_graph("g1").await.unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }

    #[tokio::test]
    async fn recover_after_snapshot_and_further_wal() {
        let store = memory_storage().await;
        store.create_graph(&Graph::new("g1", "goal")).await.unwrap();
        store.add_node("g1", &Node::new("a", "researcher")).await.unwrap();
        store
            .update_node_status("g1", "a", NodeStatus::Pending, None)
            .await
            .unwrap();

        let graph = store.load_graph("g1").await.unwrap();
        let seq = WalRepository::max_sequence(&store.pool, "g1").await.unwrap();
        let data = serde_json::to_vec(&graph).unwrap();
        store.save_snapshot("g1", seq, data).await.unwrap();
        store.mark_wal_replayed("g1", seq).await.unwrap();

        store
            .update_node_status("g1", "a", NodeStatus::Running, None)
            .await
            .unwrap();

        let recovered = store.recover_graph("g1").await.unwrap();
        assert_eq!(recovered.nodes_by_id["a"].status, NodeStatus::Running);
    }
}
