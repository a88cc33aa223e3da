//! Per-node worker task: lock, rate-limit, dispatch-with-retry, release.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::dispatch::{CritiqueRequest, Dispatcher, DispatchError, ResearchRequest, SynthesizeRequest};
use crate::graph::{Graph, Node, NodeStatus};
use crate::retry::{run_with_retry, CheckpointStore, CircuitBreakerRegistry, RetryMetrics, RetryOutcome, RetryPolicy};

use super::lock::{acquire_with_retry, NodeLockManager};
use super::limiter::RateLimiterRegistry;
use super::result::{NodeOutput, NodeResult};

/// Parent outputs a node may consume, gathered from succeeded parents only.
fn gather_claims(graph: &Graph, node_id: &str, outputs: &HashMap<String, NodeOutput>) -> Vec<String> {
    graph
        .parents_of(node_id)
        .filter(|p| graph.node(p).map(|n| n.status == NodeStatus::Succeeded).unwrap_or(false))
        .filter_map(|p| match outputs.get(p) {
            Some(NodeOutput::Claims(claims)) => Some(claims.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn gather_verification_results(graph: &Graph, node_id: &str, outputs: &HashMap<String, NodeOutput>) -> Vec<String> {
    graph
        .parents_of(node_id)
        .filter(|p| graph.node(p).map(|n| n.status == NodeStatus::Succeeded).unwrap_or(false))
        .filter_map(|p| match outputs.get(p) {
            Some(NodeOutput::Critique { results, .. }) => Some(results.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Run one node to completion: lock, rate-limit, retry-with-backoff dispatch,
/// then release both permits on every exit path.
#[allow(clippy::too_many_arguments)]
pub async fn run_node(
    node: Node,
    graph_snapshot: Arc<Graph>,
    outputs: Arc<RwLock<HashMap<String, NodeOutput>>>,
    run_id: String,
    owner: String,
    dispatcher: Arc<dyn Dispatcher>,
    policy: RetryPolicy,
    breaker: CircuitBreakerRegistry,
    checkpoints: Arc<dyn CheckpointStore>,
    lock_manager: Arc<dyn NodeLockManager>,
    limiter: RateLimiterRegistry,
    node_execution_timeout: Duration,
) -> NodeResult {
    let node_id = node.id.clone();
    let node_type = node.node_type.clone();

    if acquire_with_retry(lock_manager.as_ref(), &run_id, &node_id, &owner)
        .await
        .is_err()
    {
        debug!(node_id, "node lock contention, treating as transient failure");
        return NodeResult {
            node_id,
            node_type,
            outcome: Err("node lock contention".to_string()),
            metrics: RetryMetrics {
                total_attempts: 1,
                transient_failures: 1,
                ..Default::default()
            },
        };
    }

    let permit = limiter.acquire(&node_type).await;

    let result = run_one_node(
        &node,
        &graph_snapshot,
        &outputs,
        &run_id,
        &dispatcher,
        &policy,
        &breaker,
        checkpoints.as_ref(),
        node_execution_timeout,
    )
    .await;

    drop(permit);
    lock_manager.unlock(&run_id, &node_id, &owner).await;

    match result {
        RetryOutcome::Success(output) => {
            outputs.write().await.insert(node_id.clone(), output.clone());
            NodeResult {
                node_id,
                node_type,
                outcome: Ok(output),
                metrics: RetryMetrics {
                    success_count: 1,
                    ..Default::default()
                },
            }
        }
        RetryOutcome::Failed { last_error, metrics } => {
            error!(node_id, error = %last_error, "node failed");
            NodeResult {
                node_id,
                node_type,
                outcome: Err(last_error),
                metrics,
            }
        }
        RetryOutcome::CircuitOpen { metrics } => NodeResult {
            node_id,
            node_type,
            outcome: Err("circuit open for node type".to_string()),
            metrics,
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_node(
    node: &Node,
    graph_snapshot: &Arc<Graph>,
    outputs: &Arc<RwLock<HashMap<String, NodeOutput>>>,
    run_id: &str,
    dispatcher: &Arc<dyn Dispatcher>,
    policy: &RetryPolicy,
    breaker: &CircuitBreakerRegistry,
    checkpoints: &dyn CheckpointStore,
    node_execution_timeout: Duration,
) -> RetryOutcome<NodeOutput> {
    if !matches!(node.node_type.as_str(), "researcher" | "critic" | "synthesizer") {
        return RetryOutcome::Failed {
            last_error: format!("unknown node type: {}", node.node_type),
            metrics: RetryMetrics {
                total_attempts: 1,
                permanent_failures: 1,
                ..Default::default()
            },
        };
    }

    run_with_retry(
        &node.node_type,
        run_id,
        &node.id,
        policy,
        breaker,
        checkpoints,
        |_attempt| dispatch_once(node, graph_snapshot, outputs, run_id, dispatcher, node_execution_timeout),
    )
    .await
}

async fn dispatch_once(
    node: &Node,
    graph_snapshot: &Arc<Graph>,
    outputs: &Arc<RwLock<HashMap<String, NodeOutput>>>,
    run_id: &str,
    dispatcher: &Arc<dyn Dispatcher>,
    node_execution_timeout: Duration,
) -> Result<NodeOutput, DispatchError> {
    let call = async {
        match node.node_type.as_str() {
            "researcher" => {
                let req = ResearchRequest {
                    query: node.config.get("query").cloned().unwrap_or_default(),
                    source_node_id: node.id.clone(),
                    run_id: run_id.to_string(),
                    config: node.config.clone(),
                };
                let resp = dispatcher.research(req).await?;
                Ok(NodeOutput::Claims(resp.claims))
            }
            "critic" => {
                let claims = {
                    let outputs = outputs.read().await;
                    gather_claims(graph_snapshot, &node.id, &outputs)
                };
                let req = CritiqueRequest {
                    claims,
                    task: graph_snapshot.goal().to_string(),
                    run_id: run_id.to_string(),
                };
                let resp = dispatcher.critique(req).await?;
                Ok(NodeOutput::Critique {
                    results: resp.results,
                    verified_count: resp.verified_count,
                })
            }
            "synthesizer" => {
                let verification_results = {
                    let outputs = outputs.read().await;
                    gather_verification_results(graph_snapshot, &node.id, &outputs)
                };
                let req = SynthesizeRequest {
                    verification_results,
                    context: graph_snapshot.goal().to_string(),
                    run_id: run_id.to_string(),
                };
                let resp = dispatcher.synthesize(req).await?;
                Ok(NodeOutput::Report {
                    report: resp.report,
                    artifact_uri: resp.artifact_uri,
                })
            }
            other => Err(DispatchError::UnknownNodeType(other.to_string())),
        }
    };

    match tokio::time::timeout(node_execution_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(DispatchError::DeadlineExceeded(format!(
            "node '{}' exceeded execution timeout",
            node.id
        ))),
    }
}
