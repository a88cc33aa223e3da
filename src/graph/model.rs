//! Core data model: [`Node`], [`Edge`], [`Graph`] and [`NodeStatus`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration keys that mark a node as composite rather than atomic.
/// A node carrying any of these keys describes more than a single unit of
/// work and is rejected during validation.
pub const RESERVED_CONFIG_KEYS: &[&str] = &["steps", "tasks", "pipeline", "subgraph", "batch"];

/// Status of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Created,
    Pending,
    Running,
    Retrying,
    Failed,
    Cancelled,
    Blocked,
    Succeeded,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Created => "CREATED",
            NodeStatus::Pending => "PENDING",
            NodeStatus::Running => "RUNNING",
            NodeStatus::Retrying => "RETRYING",
            NodeStatus::Failed => "FAILED",
            NodeStatus::Cancelled => "CANCELLED",
            NodeStatus::Blocked => "BLOCKED",
            NodeStatus::Succeeded => "SUCCEEDED",
        }
    }

    /// True once a node will never execute again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Succeeded | NodeStatus::Cancelled)
    }

    /// Whether `self -> target` is a legal transition per the node state machine.
    pub fn can_transition_to(&self, target: NodeStatus) -> bool {
        use NodeStatus::*;
        matches!(
            (self, target),
            (Created, Pending)
                | (Created, Running)
                | (Created, Blocked)
                | (Created, Cancelled)
                | (Blocked, Pending)
                | (Blocked, Cancelled)
                | (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Retrying)
                | (Running, Cancelled)
                | (Retrying, Running)
                | (Retrying, Failed)
                | (Retrying, Cancelled)
                | (Failed, Retrying)
                | (Failed, Cancelled)
                | (Cancelled, Created)
        )
    }
}

/// Status of an entire graph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphStatus {
    Created,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl GraphStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphStatus::Created => "CREATED",
            GraphStatus::Running => "RUNNING",
            GraphStatus::Succeeded => "SUCCEEDED",
            GraphStatus::Failed => "FAILED",
            GraphStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether `self -> target` is legal. `SUCCEEDED -> RUNNING` is the
    /// one deliberate exception: dynamic expansion can reopen a graph that
    /// had already finished.
    pub fn can_transition_to(&self, target: GraphStatus) -> bool {
        use GraphStatus::*;
        matches!(
            (self, target),
            (Created, Running)
                | (Created, Cancelled)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Succeeded, Running)
        )
    }
}

/// A single unit of work in the graph. Atomic: its `config` must never
/// describe substeps (see [`RESERVED_CONFIG_KEYS`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub config: HashMap<String, String>,
    pub status: NodeStatus,
    pub relevance: f64,
    pub depth: u32,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: HashMap::new(),
            status: NodeStatus::Created,
            relevance: 0.0,
            depth: 0,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn with_config(mut self, config: HashMap<String, String>) -> Self {
        self.config = config;
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Reserved composite key present in `config`, if any.
    pub fn reserved_key(&self) -> Option<&'static str> {
        RESERVED_CONFIG_KEYS
            .iter()
            .find(|key| self.config.contains_key(**key))
            .copied()
    }
}

/// A directed dependency: `from` must succeed before `to` can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A DAG of nodes and edges plus run-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    pub status: GraphStatus,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: HashMap<String, String>,
}

impl Graph {
    pub fn new(id: impl Into<String>, goal: impl Into<String>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("goal".to_string(), goal.into());
        Self {
            id: id.into(),
            status: GraphStatus::Created,
            nodes: Vec::new(),
            edges: Vec::new(),
            metadata,
        }
    }

    pub fn goal(&self) -> &str {
        self.metadata.get("goal").map(String::as_str).unwrap_or("")
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// IDs of the direct parents of `id` (edges `* -> id`).
    pub fn parents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.to == id)
            .map(|e| e.from.as_str())
    }

    /// IDs of the direct children of `id` (edges `id -> *`).
    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == id)
            .map(|e| e.to.as_str())
    }
}
