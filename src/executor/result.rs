//! Per-node and per-run outcome types surfaced by the executor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::retry::RetryMetrics;

/// Typed payload produced by a node, keyed by its node type. Kept in-memory
/// for the lifetime of a run rather than persisted: crash recovery restores
/// graph topology and statuses (§4.6) but not intermediate worker payloads,
/// which downstream nodes would need to regenerate after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeOutput {
    Claims(Vec<String>),
    Critique { results: Vec<String>, verified_count: u32 },
    Report { report: String, artifact_uri: Option<String> },
}

/// Result of running one node to completion (success or exhaustion/failure).
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub node_id: String,
    pub node_type: String,
    pub outcome: Result<NodeOutput, String>,
    pub metrics: RetryMetrics,
}

/// Final outcome of a graph execution, returned from [`super::Executor::execute`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: String,
    pub success: bool,
    pub partial_success: bool,
    pub succeeded_nodes: Vec<String>,
    pub failed_nodes: HashMap<String, String>,
    pub final_report: Option<String>,
    pub artifact_uri: Option<String>,
    pub error_message: Option<String>,
    pub retry_metrics: HashMap<String, RetryMetricsSummary>,
}

/// Serializable mirror of [`RetryMetrics`] for inclusion in [`ExecutionResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryMetricsSummary {
    pub total_attempts: u32,
    pub success_count: u32,
    pub transient_failures: u32,
    pub permanent_failures: u32,
    pub circuit_rejections: u32,
}

impl From<&RetryMetrics> for RetryMetricsSummary {
    fn from(m: &RetryMetrics) -> Self {
        Self {
            total_attempts: m.total_attempts,
            success_count: m.success_count,
            transient_failures: m.transient_failures,
            permanent_failures: m.permanent_failures,
            circuit_rejections: m.circuit_rejections,
        }
    }
}
