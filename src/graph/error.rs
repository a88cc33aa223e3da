//! Errors produced by graph validation and the node/graph state machine.

use thiserror::Error;

/// Errors raised while validating or mutating a [`crate::graph::Graph`].
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph failed one or more structural checks. Carries every issue
    /// found, not just the first.
    #[error("graph validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A node or edge referenced an ID that does not exist in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// An attempted status transition is not in the allowed relation.
    #[error("invalid transition for node {node}: {from} -> {to}")]
    InvalidNodeTransition {
        node: String,
        from: &'static str,
        to: &'static str,
    },

    /// An attempted graph-level status transition is not in the allowed relation.
    #[error("invalid graph transition: {from} -> {to}")]
    InvalidGraphTransition { from: &'static str, to: &'static str },

    /// A node configuration carried a reserved composite key.
    #[error("node {node} is not atomic: reserved key '{key}' present in config")]
    NotAtomic { node: String, key: String },

    /// Dynamic expansion was rejected.
    #[error("expansion rejected: {0}")]
    ExpansionRejected(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
