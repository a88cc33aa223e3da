//! Write-ahead-log mutation taxonomy and the recovered-state shape produced
//! by replaying it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Graph, GraphStatus, Node, NodeStatus};

/// One durable mutation, tagged by kind with a typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mutation_type", content = "payload")]
pub enum Mutation {
    CreateGraph { graph: Graph },
    UpdateGraphStatus { status: GraphStatus },
    AddNode { node: Node },
    UpdateNodeStatus { node_id: String, status: NodeStatus, last_error: Option<String> },
    AddEdge { edge: Edge },
    SignalReceived { entity: String, source_node_id: String },
}

/// A single WAL row as stored: the mutation plus its durable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub id: i64,
    pub graph_id: String,
    pub sequence_num: i64,
    pub mutation: Mutation,
    pub replayed: bool,
}

/// State reconstructed by replaying a snapshot plus unreplayed WAL entries.
/// Intentionally separate from [`Graph`] even though the shape overlaps: this
/// is a replay product, not something callers mutate directly.
#[derive(Debug, Clone, Default)]
pub struct RecoveredGraphState {
    pub graph: Option<Graph>,
    pub nodes_by_id: HashMap<String, Node>,
    pub edges: Vec<Edge>,
    pub last_sequence: i64,
}

impl RecoveredGraphState {
    /// Apply one WAL entry's mutation to the in-progress recovered state.
    /// Deterministic: replaying the same entries in order always yields the
    /// same resulting state.
    pub fn apply(&mut self, entry: &WalEntry) {
        match &entry.mutation {
            Mutation::CreateGraph { graph } => {
                self.graph = Some(graph.clone());
                self.nodes_by_id = graph.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
                self.edges = graph.edges.clone();
            }
            Mutation::UpdateGraphStatus { status } => {
                if let Some(g) = &mut self.graph {
                    g.status = *status;
                }
            }
            Mutation::AddNode { node } => {
                self.nodes_by_id.insert(node.id.clone(), node.clone());
                if let Some(g) = &mut self.graph {
                    g.nodes.push(node.clone());
                }
            }
            Mutation::UpdateNodeStatus { node_id, status, last_error } => {
                if let Some(n) = self.nodes_by_id.get_mut(node_id) {
                    n.status = *status;
                    n.last_error = last_error.clone();
                }
                if let Some(g) = &mut self.graph {
                    if let Some(n) = g.node_mut(node_id) {
                        n.status = *status;
                        n.last_error = last_error.clone();
                    }
                }
            }
            Mutation::AddEdge { edge } => {
                self.edges.push(edge.clone());
                if let Some(g) = &mut self.graph {
                    g.edges.push(edge.clone());
                }
            }
            Mutation::SignalReceived { .. } => {
                // Informational only; the resulting AddNode/AddEdge entries
                // carry the actual state change.
            }
        }
        self.last_sequence = entry.sequence_num;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn replay_reconstructs_node_status() {
        let mut state = RecoveredGraphState::default();
        let graph = Graph::new("g1", "goal");
        state.apply(&WalEntry {
            id: 1,
            graph_id: "g1".into(),
            sequence_num: 1,
            mutation: Mutation::CreateGraph { graph },
            replayed: false,
        });
        state.apply(&WalEntry {
            id: 2,
            graph_id: "g1".into(),
            sequence_num: 2,
            mutation: Mutation::AddNode { node: Node::new("a", "researcher") },
            replayed: false,
        });
        state.apply(&WalEntry {
            id: 3,
            graph_id: "g1".into(),
            sequence_num: 3,
            mutation: Mutation::UpdateNodeStatus {
                node_id: "a".into(),
                status: NodeStatus::Succeeded,
                last_error: None,
            },
            replayed: false,
        });

        assert_eq!(state.nodes_by_id["a"].status, NodeStatus::Succeeded);
        assert_eq!(state.last_sequence, 3);
    }
}
