//! The driver: owns graph-state mutations, schedules batches of `PENDING`
//! nodes, spawns one worker task per node, reconciles completions, and
//! classifies the terminal outcome.

pub mod error;
pub mod limiter;
pub mod lock;
pub mod result;
pub mod worker;

pub use error::{ExecutorError, Result};
pub use limiter::RateLimiterRegistry;
pub use lock::{InMemoryLockManager, NodeLockManager};
pub use result::{ExecutionResult, NodeOutput, NodeResult, RetryMetricsSummary};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::graph::{evaluate_readiness, handle_signal, schedule_next_batch, set_graph_status, set_node_status};
use crate::graph::{EntitySignal, Graph, GraphStatus, NodeStatus};
use crate::retry::{CheckpointStore, CircuitBreakerConfig, CircuitBreakerRegistry, InMemoryCheckpointStore, RetryPolicy};
use crate::storage::Storage;

use worker::run_node;

/// Tunables for one [`Executor`]; every field has the default named in the
/// environment-configuration table.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_workers: usize,
    pub rate_limits: HashMap<String, usize>,
    pub default_rate_limit: usize,
    pub node_execution_timeout: Duration,
    pub lock_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert("researcher".to_string(), 5);
        rate_limits.insert("critic".to_string(), 3);
        rate_limits.insert("synthesizer".to_string(), 2);
        Self {
            max_workers: 10,
            rate_limits,
            default_rate_limit: 1,
            node_execution_timeout: Duration::from_secs(300),
            lock_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Holds the worker dispatcher, scheduling/concurrency primitives, and
/// optional persistence, and drives one graph run to completion.
#[derive(Clone)]
pub struct Executor {
    dispatcher: Arc<dyn Dispatcher>,
    storage: Option<Arc<dyn Storage>>,
    checkpoints: Arc<dyn CheckpointStore>,
    lock_manager: Arc<dyn NodeLockManager>,
    limiter: RateLimiterRegistry,
    breaker: CircuitBreakerRegistry,
    policy: RetryPolicy,
    max_workers: usize,
    node_execution_timeout: Duration,
}

impl Executor {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, config: ExecutorConfig) -> Self {
        Self {
            dispatcher,
            storage: None,
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
            lock_manager: Arc::new(InMemoryLockManager::new(config.lock_timeout)),
            limiter: RateLimiterRegistry::new(config.rate_limits, config.default_rate_limit),
            breaker: CircuitBreakerRegistry::new(config.circuit_breaker),
            policy: config.retry_policy,
            max_workers: config.max_workers,
            node_execution_timeout: config.node_execution_timeout,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_checkpoint_store(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn with_lock_manager(mut self, lock_manager: Arc<dyn NodeLockManager>) -> Self {
        self.lock_manager = lock_manager;
        self
    }

    /// Run `graph` to completion. `cancel` is a watch-based cancellation
    /// signal (true once cancelled); `signals`, if given, feeds dynamic
    /// expansion signals into the same driver loop that reconciles node
    /// completions.
    pub async fn execute(
        &self,
        mut graph: Graph,
        run_id: String,
        mut cancel: watch::Receiver<bool>,
        mut signals: Option<mpsc::UnboundedReceiver<EntitySignal>>,
    ) -> Result<ExecutionResult> {
        crate::graph::validate(&graph)?;

        if let Some(storage) = &self.storage {
            storage.create_graph(&graph).await?;
        }

        if let Some(storage) = &self.storage {
            storage.update_graph_status(&graph.id, GraphStatus::Running).await?;
        }
        set_graph_status(&mut graph, GraphStatus::Running)?;
        evaluate_readiness(&mut graph);

        let outputs: Arc<RwLock<HashMap<String, NodeOutput>>> = Arc::new(RwLock::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel::<NodeResult>();

        let mut in_flight: usize = 0;
        let mut failed_nodes: HashMap<String, String> = HashMap::new();
        let mut succeeded_nodes: Vec<String> = Vec::new();
        let mut retry_metrics: HashMap<String, RetryMetricsSummary> = HashMap::new();

        loop {
            if *cancel.borrow() {
                return Err(ExecutorError::Cancelled);
            }

            let pending_count = graph
                .nodes
                .iter()
                .filter(|n| n.status == NodeStatus::Pending)
                .count();
            let available = self.max_workers.saturating_sub(in_flight);

            if available > 0 && pending_count > 0 {
                let scheduled = schedule_next_batch(&mut graph, available)?;
                let snapshot = Arc::new(graph.clone());

                for node_id in scheduled {
                    if let Some(storage) = &self.storage {
                        storage.update_node_status(&graph.id, &node_id, NodeStatus::Running, None).await?;
                    }

                    let node = graph.node(&node_id).unwrap().clone();
                    let tx = tx.clone();
                    let dispatcher = self.dispatcher.clone();
                    let policy = self.policy.clone();
                    let breaker = self.breaker.clone();
                    let checkpoints = self.checkpoints.clone();
                    let lock_manager = self.lock_manager.clone();
                    let limiter = self.limiter.clone();
                    let timeout = self.node_execution_timeout;
                    let outputs = outputs.clone();
                    let run_id = run_id.clone();
                    let snapshot = snapshot.clone();

                    in_flight += 1;
                    debug!(node_id = %node_id, "dispatching node worker");

                    tokio::spawn(async move {
                        let result = run_node(
                            node,
                            snapshot,
                            outputs,
                            run_id,
                            "executor".to_string(),
                            dispatcher,
                            policy,
                            breaker,
                            checkpoints,
                            lock_manager,
                            limiter,
                            timeout,
                        )
                        .await;
                        let _ = tx.send(result);
                    });
                }
            }

            let no_work_in_flight = in_flight == 0;
            let no_schedulable = pending_count == 0
                && !graph.nodes.iter().any(|n| n.status == NodeStatus::Running);

            if no_work_in_flight && no_schedulable {
                break;
            }

            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        return Err(ExecutorError::Cancelled);
                    }
                }
                result = rx.recv() => {
                    let Some(result) = result else { break };
                    in_flight -= 1;

                    retry_metrics.insert(result.node_id.clone(), (&result.metrics).into());

                    match result.outcome {
                        Ok(output) => {
                            if let Some(storage) = &self.storage {
                                storage.update_node_status(&graph.id, &result.node_id, NodeStatus::Succeeded, None).await?;
                            }
                            set_node_status(&mut graph, &result.node_id, NodeStatus::Succeeded)?;
                            if let Some(storage) = &self.storage {
                                storage.maybe_snapshot(&graph.id).await?;
                            }
                            if let NodeOutput::Report { .. } = &output {
                                info!(node_id = %result.node_id, "synthesizer produced final report");
                            }
                            succeeded_nodes.push(result.node_id.clone());
                        }
                        Err(last_error) => {
                            warn!(node_id = %result.node_id, error = %last_error, "node terminally failed");
                            if let Some(storage) = &self.storage {
                                storage
                                    .update_node_status(&graph.id, &result.node_id, NodeStatus::Failed, Some(last_error.clone()))
                                    .await?;
                            }
                            set_node_status(&mut graph, &result.node_id, NodeStatus::Failed)?;
                            failed_nodes.insert(result.node_id.clone(), last_error);
                        }
                    }

                    evaluate_readiness(&mut graph);
                }
                maybe_signal = recv_signal(&mut signals) => {
                    if let Some(signal) = maybe_signal {
                        // Validate + construct against a throwaway clone first so the
                        // new node/edge can be persisted before the live graph is
                        // mutated, keeping WAL-before-apply for expansion too.
                        let mut trial = graph.clone();
                        match handle_signal(&mut trial, &signal) {
                            Ok(new_node_id) => {
                                if let Some(storage) = &self.storage {
                                    let node = trial.node(&new_node_id).unwrap().clone();
                                    storage.add_node(&graph.id, &node).await?;
                                    if let Some(edge) = trial.edges.iter().find(|e| e.to == new_node_id) {
                                        storage.add_edge(&graph.id, edge).await?;
                                    }
                                }
                                handle_signal(&mut graph, &signal)
                                    .expect("signal admitted against trial clone must admit identically against the live graph");
                                info!(node_id = %new_node_id, "dynamic expansion admitted new node");
                            }
                            Err(e) => debug!(error = %e, "expansion signal rejected"),
                        }
                    }
                }
            }
        }

        Ok(self.finish(graph, run_id, succeeded_nodes, failed_nodes, retry_metrics, outputs).await?)
    }

    async fn finish(
        &self,
        mut graph: Graph,
        run_id: String,
        succeeded_nodes: Vec<String>,
        failed_nodes: HashMap<String, String>,
        retry_metrics: HashMap<String, RetryMetricsSummary>,
        outputs: Arc<RwLock<HashMap<String, NodeOutput>>>,
    ) -> Result<ExecutionResult> {
        let blocked_remaining: Vec<String> = graph
            .nodes
            .iter()
            .filter(|n| matches!(n.status, NodeStatus::Blocked | NodeStatus::Created))
            .map(|n| n.id.clone())
            .collect();

        let outputs = outputs.read().await;
        let report = graph
            .nodes
            .iter()
            .filter(|n| n.node_type == "synthesizer" && n.status == NodeStatus::Succeeded)
            .find_map(|n| match outputs.get(&n.id) {
                Some(NodeOutput::Report { report, artifact_uri }) => Some((report.clone(), artifact_uri.clone())),
                _ => None,
            });

        let mut result = ExecutionResult {
            run_id: run_id.clone(),
            succeeded_nodes,
            failed_nodes,
            retry_metrics,
            ..Default::default()
        };

        let final_status = if !blocked_remaining.is_empty() {
            result.success = false;
            result.error_message = Some(format!(
                "deadlock: {} node(s) never became schedulable: {}",
                blocked_remaining.len(),
                blocked_remaining.join(", ")
            ));
            GraphStatus::Failed
        } else if result.failed_nodes.is_empty() {
            result.success = true;
            if let Some((report, artifact_uri)) = report {
                result.final_report = Some(report);
                result.artifact_uri = artifact_uri;
            }
            GraphStatus::Succeeded
        } else if result.succeeded_nodes.is_empty() {
            result.success = false;
            result.error_message = Some("all nodes failed".to_string());
            GraphStatus::Failed
        } else {
            result.success = false;
            result.partial_success = true;
            if let Some((report, artifact_uri)) = report {
                result.final_report = Some(report);
                result.artifact_uri = artifact_uri;
            }
            GraphStatus::Failed
        };

        if graph.status.can_transition_to(final_status) {
            if let Some(storage) = &self.storage {
                storage.update_graph_status(&graph.id, final_status).await?;
            }
            set_graph_status(&mut graph, final_status)?;
        }

        Ok(result)
    }
}

async fn recv_signal(signals: &mut Option<mpsc::UnboundedReceiver<EntitySignal>>) -> Option<EntitySignal> {
    match signals {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
