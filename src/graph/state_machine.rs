//! Status transitions and readiness evaluation.

use super::error::{GraphError, Result};
use super::model::{Graph, GraphStatus, NodeStatus};

/// Apply `target` to node `id`, checking the transition is legal.
pub fn set_node_status(graph: &mut Graph, id: &str, target: NodeStatus) -> Result<()> {
    let current = graph
        .node(id)
        .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?
        .status;

    if !current.can_transition_to(target) {
        return Err(GraphError::InvalidNodeTransition {
            node: id.to_string(),
            from: current.as_str(),
            to: target.as_str(),
        });
    }

    graph.node_mut(id).unwrap().status = target;
    Ok(())
}

/// Apply `target` to the graph's own status, checking the transition is legal.
pub fn set_graph_status(graph: &mut Graph, target: GraphStatus) -> Result<()> {
    if !graph.status.can_transition_to(target) {
        return Err(GraphError::InvalidGraphTransition {
            from: graph.status.as_str(),
            to: target.as_str(),
        });
    }
    graph.status = target;
    Ok(())
}

/// Sweep every `CREATED`/`BLOCKED` node and move it to `PENDING` once all of
/// its parents have `SUCCEEDED`, or keep/set it `BLOCKED` otherwise. A parent
/// in `RETRYING` counts as unfinished: no speculative execution of children.
///
/// Returns the IDs of nodes that transitioned to `PENDING`.
pub fn evaluate_readiness(graph: &mut Graph) -> Vec<String> {
    let mut newly_ready = Vec::new();

    let candidates: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| matches!(n.status, NodeStatus::Created | NodeStatus::Blocked))
        .map(|n| n.id.clone())
        .collect();

    for id in candidates {
        let parents: Vec<String> = graph.parents_of(&id).map(str::to_string).collect();
        let ready = parents
            .iter()
            .all(|p| graph.node(p).map(|n| n.status == NodeStatus::Succeeded).unwrap_or(false));

        let current = graph.node(&id).unwrap().status;
        if ready {
            if current != NodeStatus::Pending {
                // CREATED and BLOCKED can both reach PENDING.
                let _ = set_node_status(graph, &id, NodeStatus::Pending);
                newly_ready.push(id);
            }
        } else if current == NodeStatus::Created {
            let _ = set_node_status(graph, &id, NodeStatus::Blocked);
        }
    }

    newly_ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{Edge, Node};

    fn two_node_graph() -> Graph {
        let mut g = Graph::new("g1", "goal");
        g.nodes.push(Node::new("a", "researcher"));
        g.nodes.push(Node::new("b", "critic"));
        g.edges.push(Edge::new("a", "b"));
        g
    }

    #[test]
    fn root_becomes_pending_immediately() {
        let mut g = two_node_graph();
        evaluate_readiness(&mut g);
        assert_eq!(g.node("a").unwrap().status, NodeStatus::Pending);
        assert_eq!(g.node("b").unwrap().status, NodeStatus::Blocked);
    }

    #[test]
    fn child_becomes_pending_after_parent_succeeds() {
        let mut g = two_node_graph();
        evaluate_readiness(&mut g);
        set_node_status(&mut g, "a", NodeStatus::Running).unwrap();
        set_node_status(&mut g, "a", NodeStatus::Succeeded).unwrap();
        let ready = evaluate_readiness(&mut g);
        assert_eq!(ready, vec!["b".to_string()]);
        assert_eq!(g.node("b").unwrap().status, NodeStatus::Pending);
    }

    #[test]
    fn child_stays_blocked_while_parent_retrying() {
        let mut g = two_node_graph();
        evaluate_readiness(&mut g);
        set_node_status(&mut g, "a", NodeStatus::Running).unwrap();
        set_node_status(&mut g, "a", NodeStatus::Retrying).unwrap();
        evaluate_readiness(&mut g);
        assert_eq!(g.node("b").unwrap().status, NodeStatus::Blocked);
    }

    #[test]
    fn invalid_transition_rejected() {
        let mut g = two_node_graph();
        let err = set_node_status(&mut g, "a", NodeStatus::Succeeded).unwrap_err();
        assert!(matches!(err, GraphError::InvalidNodeTransition { .. }));
    }

    #[test]
    fn succeeded_graph_can_resume_to_running() {
        let mut g = two_node_graph();
        set_graph_status(&mut g, GraphStatus::Running).unwrap();
        set_graph_status(&mut g, GraphStatus::Succeeded).unwrap();
        assert!(set_graph_status(&mut g, GraphStatus::Running).is_ok());
    }
}
