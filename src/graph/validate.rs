//! Structural validation of a [`Graph`] before it is accepted for execution.

use std::collections::{HashMap, HashSet};

use super::error::{GraphError, Result};
use super::model::Graph;

/// Longest dependency chain allowed in a graph, including chains created by
/// dynamic expansion at runtime.
pub const MAX_DEPTH: u32 = 3;

/// Run every structural check and return the union of all failures found.
///
/// Non-empty / unique-ID / edge-endpoint checks are aggregated (every issue
/// is reported at once); acyclicity and the depth guard short-circuit on
/// first violation since further analysis on a cyclic graph is meaningless.
pub fn validate(graph: &Graph) -> Result<()> {
    let mut issues = Vec::new();

    if graph.nodes.is_empty() {
        issues.push("graph has no nodes".to_string());
    }

    let mut seen_ids = HashSet::new();
    for node in &graph.nodes {
        if node.id.is_empty() {
            issues.push("node has empty id".to_string());
            continue;
        }
        if node.node_type.is_empty() {
            issues.push(format!("node {} has empty type", node.id));
        }
        if !seen_ids.insert(node.id.as_str()) {
            issues.push(format!("duplicate node id: {}", node.id));
        }
    }

    for edge in &graph.edges {
        if edge.from == edge.to {
            issues.push(format!("self-loop on node {}", edge.from));
            continue;
        }
        if graph.node(&edge.from).is_none() {
            issues.push(format!("edge references unknown node: {}", edge.from));
        }
        if graph.node(&edge.to).is_none() {
            issues.push(format!("edge references unknown node: {}", edge.to));
        }
    }

    for node in &graph.nodes {
        if let Some(key) = node.reserved_key() {
            issues.push(format!(
                "node {} is not atomic: reserved key '{}' present in config",
                node.id, key
            ));
        }
    }

    if !issues.is_empty() {
        return Err(GraphError::Validation(issues));
    }

    check_acyclic(graph)?;
    check_depth(graph)?;

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

fn check_acyclic(graph: &Graph) -> Result<()> {
    let mut colors: HashMap<&str, Color> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), Color::White))
        .collect();

    for node in &graph.nodes {
        if colors[node.id.as_str()] == Color::White {
            visit(graph, node.id.as_str(), &mut colors)?;
        }
    }
    Ok(())
}

fn visit<'a>(graph: &'a Graph, id: &'a str, colors: &mut HashMap<&'a str, Color>) -> Result<()> {
    colors.insert(id, Color::Gray);
    for child in graph.children_of(id) {
        match colors.get(child).copied().unwrap_or(Color::White) {
            Color::White => visit(graph, child, colors)?,
            Color::Gray => {
                return Err(GraphError::Validation(vec![format!(
                    "cycle detected involving node {}",
                    child
                )]))
            }
            Color::Black => {}
        }
    }
    colors.insert(id, Color::Black);
    Ok(())
}

fn check_depth(graph: &Graph) -> Result<()> {
    let mut memo: HashMap<&str, u32> = HashMap::new();
    for node in &graph.nodes {
        let depth = longest_path_from(graph, node.id.as_str(), &mut memo);
        if depth > MAX_DEPTH {
            return Err(GraphError::Validation(vec![format!(
                "longest path from {} has length {} exceeding max depth {}",
                node.id, depth, MAX_DEPTH
            )]));
        }
    }
    Ok(())
}

fn longest_path_from<'a>(graph: &'a Graph, id: &'a str, memo: &mut HashMap<&'a str, u32>) -> u32 {
    if let Some(d) = memo.get(id) {
        return *d;
    }
    let mut best = 0;
    for child in graph.children_of(id) {
        best = best.max(1 + longest_path_from(graph, child, memo));
    }
    memo.insert(id, best);
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{Edge, Node};

    fn linear_graph(len: usize) -> Graph {
        let mut g = Graph::new("g1", "goal");
        for i in 0..len {
            g.nodes.push(Node::new(format!("n{i}"), "researcher"));
        }
        for i in 0..len.saturating_sub(1) {
            g.edges.push(Edge::new(format!("n{i}"), format!("n{}", i + 1)));
        }
        g
    }

    #[test]
    fn rejects_empty_graph() {
        let g = Graph::new("g1", "goal");
        assert!(validate(&g).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut g = linear_graph(1);
        g.nodes.push(Node::new("n0", "critic"));
        let err = validate(&g).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn rejects_dangling_edge() {
        let mut g = linear_graph(1);
        g.edges.push(Edge::new("n0", "missing"));
        assert!(validate(&g).is_err());
    }

    #[test]
    fn rejects_cycle() {
        let mut g = linear_graph(3);
        g.edges.push(Edge::new("n2", "n0"));
        assert!(validate(&g).is_err());
    }

    #[test]
    fn depth_three_is_accepted_depth_four_is_not() {
        assert!(validate(&linear_graph(4)).is_ok()); // 3 edges = depth 3
        assert!(validate(&linear_graph(5)).is_err()); // 4 edges = depth 4
    }

    #[test]
    fn rejects_non_atomic_node() {
        let mut g = linear_graph(1);
        g.nodes[0].config.insert("steps".to_string(), "[]".to_string());
        let err = validate(&g).unwrap_err();
        match err {
            GraphError::Validation(issues) => {
                assert!(issues.iter().any(|i| i.contains("not atomic")));
            }
            _ => panic!("expected validation error"),
        }
    }
}
