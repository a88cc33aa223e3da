//! In-memory `Storage` implementation, used by tests and by the engine when
//! durability is not required.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::graph::{Edge, Graph, GraphStatus, Node, NodeStatus};

use super::error::{Result, StorageError};
use super::wal::{Mutation, RecoveredGraphState, WalEntry};
use super::{Storage, SNAPSHOT_PRUNE_MARGIN, SNAPSHOT_WAL_THRESHOLD};

#[derive(Default)]
struct GraphRecord {
    graph: Graph,
    wal: Vec<WalEntry>,
    next_seq: i64,
    next_wal_id: i64,
    snapshot: Option<(i64, Vec<u8>)>,
}

/// `Arc<RwLock<HashMap<...>>>` per-graph state, the same shape this
/// codebase's other in-process stores use for small, test-friendly state.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    graphs: Arc<RwLock<HashMap<String, GraphRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    async fn append(&self, graph_id: &str, mutation: Mutation) -> Result<i64> {
        let mut graphs = self.graphs.write().await;
        let record = graphs
            .get_mut(graph_id)
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))?;

        record.next_seq += 1;
        record.next_wal_id += 1;
        let seq = record.next_seq;
        record.wal.push(WalEntry {
            id: record.next_wal_id,
            graph_id: graph_id.to_string(),
            sequence_num: seq,
            mutation,
            replayed: false,
        });
        Ok(seq)
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_graph(&self, graph: &Graph) -> Result<i64> {
        let mut graphs = self.graphs.write().await;
        if graphs.contains_key(&graph.id) {
            return Err(StorageError::ConstraintViolation(format!(
                "graph {} already exists",
                graph.id
            )));
        }
        let mut record = GraphRecord {
            graph: graph.clone(),
            ..Default::default()
        };
        record.next_seq = 1;
        record.next_wal_id = 1;
        record.wal.push(WalEntry {
            id: 1,
            graph_id: graph.id.clone(),
            sequence_num: 1,
            mutation: Mutation::CreateGraph { graph: graph.clone() },
            replayed: false,
        });
        graphs.insert(graph.id.clone(), record);
        Ok(1)
    }

    async fn load_graph(&self, graph_id: &str) -> Result<Graph> {
        let graphs = self.graphs.read().await;
        graphs
            .get(graph_id)
            .map(|r| r.graph.clone())
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))
    }

    async fn update_graph_status(&self, graph_id: &str, status: GraphStatus) -> Result<i64> {
        let seq = self.append(graph_id, Mutation::UpdateGraphStatus { status }).await?;
        let mut graphs = self.graphs.write().await;
        let record = graphs.get_mut(graph_id).unwrap();
        record.graph.status = status;
        Ok(seq)
    }

    async fn add_node(&self, graph_id: &str, node: &Node) -> Result<i64> {
        let seq = self
            .append(graph_id, Mutation::AddNode { node: node.clone() })
            .await?;
        let mut graphs = self.graphs.write().await;
        let record = graphs.get_mut(graph_id).unwrap();
        record.graph.nodes.push(node.clone());
        Ok(seq)
    }

    async fn update_node_status(
        &self,
        graph_id: &str,
        node_id: &str,
        status: NodeStatus,
        last_error: Option<String>,
    ) -> Result<i64> {
        let seq = self
            .append(
                graph_id,
                Mutation::UpdateNodeStatus {
                    node_id: node_id.to_string(),
                    status,
                    last_error: last_error.clone(),
                },
            )
            .await?;
        let mut graphs = self.graphs.write().await;
        let record = graphs.get_mut(graph_id).unwrap();
        if let Some(n) = record.graph.node_mut(node_id) {
            n.status = status;
            n.last_error = last_error;
        }
        Ok(seq)
    }

    async fn add_edge(&self, graph_id: &str, edge: &Edge) -> Result<i64> {
        let seq = self
            .append(graph_id, Mutation::AddEdge { edge: edge.clone() })
            .await?;
        let mut graphs = self.graphs.write().await;
        let record = graphs.get_mut(graph_id).unwrap();
        record.graph.edges.push(edge.clone());
        Ok(seq)
    }

    async fn record_signal(&self, graph_id: &str, entity: &str, source_node_id: &str) -> Result<i64> {
        self.append(
            graph_id,
            Mutation::SignalReceived {
                entity: entity.to_string(),
                source_node_id: source_node_id.to_string(),
            },
        )
        .await
    }

    async fn get_unreplayed_wal(&self, graph_id: &str) -> Result<Vec<WalEntry>> {
        let graphs = self.graphs.read().await;
        let record = graphs
            .get(graph_id)
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))?;
        Ok(record.wal.iter().filter(|e| !e.replayed).cloned().collect())
    }

    async fn mark_wal_replayed(&self, graph_id: &str, upto_seq: i64) -> Result<()> {
        let mut graphs = self.graphs.write().await;
        let record = graphs
            .get_mut(graph_id)
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))?;
        for entry in record.wal.iter_mut() {
            if entry.sequence_num <= upto_seq {
                entry.replayed = true;
            }
        }
        Ok(())
    }

    async fn count_unreplayed_wal(&self, graph_id: &str) -> Result<i64> {
        Ok(self.get_unreplayed_wal(graph_id).await?.len() as i64)
    }

    async fn save_snapshot(&self, graph_id: &str, sequence_num: i64, data: Vec<u8>) -> Result<()> {
        let mut graphs = self.graphs.write().await;
        let record = graphs
            .get_mut(graph_id)
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))?;
        record.snapshot = Some((sequence_num, data));
        record.wal.retain(|e| !(e.replayed && e.sequence_num < sequence_num - SNAPSHOT_PRUNE_MARGIN));
        Ok(())
    }

    async fn load_snapshot(&self, graph_id: &str) -> Result<Option<(i64, Vec<u8>)>> {
        let graphs = self.graphs.read().await;
        Ok(graphs.get(graph_id).and_then(|r| r.snapshot.clone()))
    }

    async fn recover_graph(&self, graph_id: &str) -> Result<RecoveredGraphState> {
        let graphs = self.graphs.read().await;
        let record = graphs
            .get(graph_id)
            .ok_or_else(|| StorageError::NotFound(format!("graph {graph_id}")))?;

        let mut state = RecoveredGraphState::default();
        if let Some((seq, data)) = &record.snapshot {
            let snap: RecoveredGraphState = {
                let graph: Graph = serde_json::from_slice(data)?;
                let mut s = RecoveredGraphState::default();
                s.nodes_by_id = graph.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
                s.edges = graph.edges.clone();
                s.graph = Some(graph);
                s.last_sequence = *seq;
                s
            };
            state = snap;
        }

        for entry in record.wal.iter().filter(|e| e.sequence_num > state.last_sequence) {
            state.apply(entry);
        }
        Ok(state)
    }

    async fn maybe_snapshot(&self, graph_id: &str) -> Result<()> {
        let unreplayed = self.count_unreplayed_wal(graph_id).await?;
        if unreplayed < SNAPSHOT_WAL_THRESHOLD {
            return Ok(());
        }
        let graph = self.load_graph(graph_id).await?;
        let seq = {
            let graphs = self.graphs.read().await;
            graphs.get(graph_id).unwrap().next_seq
        };
        let data = serde_json::to_vec(&graph)?;
        self.save_snapshot(graph_id, seq, data).await?;
        self.mark_wal_replayed(graph_id, seq).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[tokio::test]
    async fn create_and_load_round_trip() {
        let store = InMemoryStorage::new();
        let graph = Graph::new("g1", "goal");
        store.create_graph(&graph).await.unwrap();
        let loaded = store.load_graph("g1").await.unwrap();
        assert_eq!(loaded.id, "g1");
    }

    #[tokio::test]
    async fn wal_sequence_is_monotonic() {
        let store = InMemoryStorage::new();
        store.create_graph(&Graph::new("g1", "goal")).await.unwrap();
        let s1 = store.add_node("g1", &Node::new("a", "researcher")).await.unwrap();
        let s2 = store
            .update_node_status("g1", "a", NodeStatus::Pending, None)
            .await
            .unwrap();
        assert!(s2 > s1);
    }

    #[tokio::test]
    async fn recover_replays_wal_from_snapshot() {
        let store = InMemoryStorage::new();
        store.create_graph(&Graph::new("g1", "goal")).await.unwrap();
        store.add_node("g1", &Node::new("a", "researcher")).await.unwrap();
        store
            .update_node_status("g1", "a", NodeStatus::Pending, None)
            .await
            .unwrap();
        store
            .update_node_status("g1", "a", NodeStatus::Running, None)
            .await
            .unwrap();
        store
            .update_node_status("g1", "a", NodeStatus::Succeeded, None)
            .await
            .unwrap();

        let recovered = store.recover_graph("g1").await.unwrap();
        assert_eq!(recovered.nodes_by_id["a"].status, NodeStatus::Succeeded);
    }
}
