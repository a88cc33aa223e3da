//! Deterministic, dependency-respecting scheduling of `PENDING` nodes.

use super::error::Result;
use super::model::{Graph, NodeStatus};
use super::state_machine::set_node_status;

/// Select up to `max_n` `PENDING` nodes, ordered by relevance descending
/// then ID ascending, and atomically transition them to `RUNNING`.
///
/// If any individual transition fails the whole batch is rolled back to
/// `PENDING` and the error is returned; scheduling never leaves the graph
/// half-committed.
pub fn schedule_next_batch(graph: &mut Graph, max_n: usize) -> Result<Vec<String>> {
    let mut candidates: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Pending)
        .map(|n| n.id.clone())
        .collect();

    candidates.sort_by(|a, b| {
        let na = graph.node(a).unwrap();
        let nb = graph.node(b).unwrap();
        nb.relevance
            .partial_cmp(&na.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(b))
    });

    candidates.truncate(max_n);

    let mut committed = Vec::with_capacity(candidates.len());
    for id in &candidates {
        match set_node_status(graph, id, NodeStatus::Running) {
            Ok(()) => committed.push(id.clone()),
            Err(e) => {
                for done in &committed {
                    let _ = set_node_status(graph, done, NodeStatus::Pending);
                }
                return Err(e);
            }
        }
    }

    Ok(committed)
}

/// Convenience wrapper around [`schedule_next_batch`] for a single node.
pub fn schedule_next(graph: &mut Graph) -> Result<Option<String>> {
    Ok(schedule_next_batch(graph, 1)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::Node;

    fn pending_graph() -> Graph {
        let mut g = Graph::new("g1", "goal");
        let mut a = Node::new("b", "researcher").with_relevance(0.5);
        a.status = NodeStatus::Pending;
        let mut b = Node::new("a", "researcher").with_relevance(0.5);
        b.status = NodeStatus::Pending;
        let mut c = Node::new("c", "researcher").with_relevance(0.9);
        c.status = NodeStatus::Pending;
        g.nodes.extend([a, b, c]);
        g
    }

    #[test]
    fn orders_by_relevance_then_id() {
        let mut g = pending_graph();
        let batch = schedule_next_batch(&mut g, 3).unwrap();
        assert_eq!(batch, vec!["c".to_string(), "a".to_string(), "b".to_string()]);
    }

    #[test]
    fn respects_max_n() {
        let mut g = pending_graph();
        let batch = schedule_next_batch(&mut g, 1).unwrap();
        assert_eq!(batch, vec!["c".to_string()]);
        assert_eq!(g.node("a").unwrap().status, NodeStatus::Pending);
    }

    #[test]
    fn scheduled_nodes_become_running() {
        let mut g = pending_graph();
        let batch = schedule_next_batch(&mut g, 3).unwrap();
        for id in batch {
            assert_eq!(g.node(&id).unwrap().status, NodeStatus::Running);
        }
    }
}
