//! Runtime graph expansion driven by worker-discovered entities.

use super::error::{GraphError, Result};
use super::model::{Edge, Graph, GraphStatus, Node, NodeStatus};
use super::state_machine::{evaluate_readiness, set_graph_status};

/// A signal's source node must be shallower than this to spawn children;
/// this bounds how far dynamic expansion can extend a chain.
const MAX_EXPANSION_SOURCE_DEPTH: u32 = 1;

/// An out-of-band signal from a worker reporting a newly discovered entity.
#[derive(Debug, Clone)]
pub struct EntitySignal {
    pub entity: String,
    pub source_node_id: String,
    pub node_type: String,
}

/// Case-insensitive substring containment in either direction. Deliberately
/// simple: a richer relevance model is future work, not this engine's job.
fn is_relevant(goal: &str, entity: &str) -> bool {
    let goal = goal.to_lowercase();
    let entity = entity.to_lowercase();
    goal.contains(&entity) || entity.contains(&goal)
}

/// Handle one discovery signal: admit it as a new node + edge, or reject it.
///
/// On admission: appends a `CREATED` node (depth = source depth + 1,
/// relevance 1.0) and an edge from the source, re-evaluates readiness, and
/// reopens the graph if it had already reached `SUCCEEDED`.
pub fn handle_signal(graph: &mut Graph, signal: &EntitySignal) -> Result<String> {
    if !is_relevant(graph.goal(), &signal.entity) {
        return Err(GraphError::ExpansionRejected(format!(
            "entity '{}' is not relevant to goal '{}'",
            signal.entity,
            graph.goal()
        )));
    }

    let already_exists = graph
        .nodes
        .iter()
        .any(|n| n.node_type == signal.node_type && n.id == signal.entity);
    if already_exists {
        return Err(GraphError::ExpansionRejected(format!(
            "entity '{}' already present",
            signal.entity
        )));
    }

    let source = graph
        .node(&signal.source_node_id)
        .ok_or_else(|| GraphError::UnknownNode(signal.source_node_id.clone()))?;

    let source_depth = source.depth;
    if source_depth >= MAX_EXPANSION_SOURCE_DEPTH {
        return Err(GraphError::ExpansionRejected(
            "max expansion depth reached".to_string(),
        ));
    }

    let new_id = signal.entity.clone();
    let new_node = Node::new(new_id.clone(), "agent")
        .with_depth(source_depth + 1)
        .with_relevance(1.0);
    let new_status_node_id = new_node.id.clone();
    graph.nodes.push(new_node);
    graph.edges.push(Edge::new(&signal.source_node_id, &new_status_node_id));

    if graph.status == GraphStatus::Succeeded {
        set_graph_status(graph, GraphStatus::Running)?;
    }

    evaluate_readiness(graph);

    Ok(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal_graph() -> Graph {
        let mut g = Graph::new("g1", "Quantum Computing");
        let mut root = Node::new("root", "researcher");
        root.status = NodeStatus::Succeeded;
        root.depth = 0;
        g.nodes.push(root);
        g
    }

    #[test]
    fn admits_relevant_entity() {
        let mut g = goal_graph();
        let sig = EntitySignal {
            entity: "Quantum".to_string(),
            source_node_id: "root".to_string(),
            node_type: "agent".to_string(),
        };
        let id = handle_signal(&mut g, &sig).unwrap();
        assert!(g.node(&id).is_some());
        assert_eq!(g.node(&id).unwrap().depth, 1);
        assert!(g.edges.iter().any(|e| e.from == "root" && e.to == id));
    }

    #[test]
    fn rejects_irrelevant_entity() {
        let mut g = goal_graph();
        let sig = EntitySignal {
            entity: "Banana Recipes".to_string(),
            source_node_id: "root".to_string(),
            node_type: "agent".to_string(),
        };
        assert!(handle_signal(&mut g, &sig).is_err());
    }

    #[test]
    fn rejects_expansion_past_depth_guard() {
        let mut g = goal_graph();
        g.node_mut("root").unwrap().depth = 2;
        let sig = EntitySignal {
            entity: "Quantum".to_string(),
            source_node_id: "root".to_string(),
            node_type: "agent".to_string(),
        };
        assert!(handle_signal(&mut g, &sig).is_err());
    }

    #[test]
    fn dedup_is_checked_before_depth() {
        let mut g = goal_graph();
        g.node_mut("root").unwrap().depth = 2;
        g.nodes.push(Node::new("Quantum", "agent"));
        let sig = EntitySignal {
            entity: "Quantum".to_string(),
            source_node_id: "root".to_string(),
            node_type: "agent".to_string(),
        };
        let err = handle_signal(&mut g, &sig).unwrap_err();
        assert!(err.to_string().contains("already present"));
    }

    #[test]
    fn reopens_succeeded_graph() {
        let mut g = goal_graph();
        g.status = GraphStatus::Succeeded;
        let sig = EntitySignal {
            entity: "Quantum".to_string(),
            source_node_id: "root".to_string(),
            node_type: "agent".to_string(),
        };
        handle_signal(&mut g, &sig).unwrap();
        assert_eq!(g.status, GraphStatus::Running);
    }
}
