//! End-to-end scenarios for the executor, covering the concrete cases the
//! engine is contracted to handle: linear success, transient retry,
//! permanent error, sibling isolation, crash-recovery, and dynamic expansion.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use hdrp_orchestrator::dispatch::{
    CritiqueRequest, CritiqueResponse, DecomposeRequest, DispatchError, Dispatcher, ResearchRequest,
    ResearchResponse, RpcCode, SynthesizeRequest, SynthesizeResponse,
};
use hdrp_orchestrator::executor::{Executor, ExecutorConfig};
use hdrp_orchestrator::graph::{EntitySignal, Edge, Graph, GraphStatus, Node, NodeStatus};
use hdrp_orchestrator::retry::RetryPolicy;
use hdrp_orchestrator::storage::InMemoryStorage;

/// Scripted outcomes for one researcher node: a queue of errors to return
/// before finally succeeding with `claims`.
struct ResearchScript {
    failures: VecDeque<DispatchError>,
    claims: Vec<String>,
}

/// A `Dispatcher` whose `research` responses are scripted per source node;
/// `critique`/`synthesize` always succeed, echoing their inputs.
#[derive(Default)]
struct MockDispatcher {
    scripts: Mutex<HashMap<String, ResearchScript>>,
}

impl MockDispatcher {
    fn new() -> Self {
        Self::default()
    }

    async fn script(&self, node_id: &str, failures: Vec<DispatchError>, claims: Vec<String>) {
        self.scripts
            .lock()
            .await
            .insert(node_id.to_string(), ResearchScript { failures: failures.into(), claims });
    }
}

#[async_trait]
impl Dispatcher for MockDispatcher {
    async fn decompose(&self, _req: DecomposeRequest) -> Result<Graph, DispatchError> {
        Err(DispatchError::Message("decompose not scripted in this test".to_string()))
    }

    async fn research(&self, req: ResearchRequest) -> Result<ResearchResponse, DispatchError> {
        let mut scripts = self.scripts.lock().await;
        let script = scripts
            .get_mut(&req.source_node_id)
            .expect("research node must be scripted");
        if let Some(err) = script.failures.pop_front() {
            return Err(err);
        }
        Ok(ResearchResponse { claims: script.claims.clone() })
    }

    async fn critique(&self, req: CritiqueRequest) -> Result<CritiqueResponse, DispatchError> {
        let verified_count = req.claims.len() as u32;
        Ok(CritiqueResponse {
            results: req.claims.into_iter().map(|c| format!("verified: {c}")).collect(),
            verified_count,
        })
    }

    async fn synthesize(&self, req: SynthesizeRequest) -> Result<SynthesizeResponse, DispatchError> {
        Ok(SynthesizeResponse {
            report: format!("report over {} verification(s)", req.verification_results.len()),
            artifact_uri: Some("memory://report".to_string()),
        })
    }
}

fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        multiplier: 1.0,
    }
}

fn no_cancel() -> watch::Receiver<bool> {
    watch::channel(false).1
}

fn linear_graph() -> Graph {
    let mut g = Graph::new("g1", "linear success");
    g.nodes.push(Node::new("a", "researcher"));
    g.nodes.push(Node::new("b", "critic"));
    g.nodes.push(Node::new("c", "synthesizer"));
    g.edges.push(Edge::new("a", "b"));
    g.edges.push(Edge::new("b", "c"));
    g
}

#[tokio::test]
async fn linear_success() {
    let dispatcher = Arc::new(MockDispatcher::new());
    dispatcher.script("a", vec![], vec!["claim one".to_string()]).await;

    let config = ExecutorConfig { retry_policy: fast_retry_policy(), ..ExecutorConfig::default() };
    let executor = Executor::new(dispatcher, config);

    let result = executor.execute(linear_graph(), "run-1".to_string(), no_cancel(), None).await.unwrap();

    assert!(result.success);
    assert_eq!(result.succeeded_nodes, vec!["a", "b", "c"]);
    assert!(result.final_report.as_deref().unwrap().contains("report over"));
}

#[tokio::test]
async fn transient_retry_then_success() {
    let dispatcher = Arc::new(MockDispatcher::new());
    dispatcher
        .script(
            "a",
            vec![
                DispatchError::DeadlineExceeded("slow worker".to_string()),
                DispatchError::DeadlineExceeded("slow worker".to_string()),
            ],
            vec!["claim one".to_string()],
        )
        .await;

    let config = ExecutorConfig { retry_policy: fast_retry_policy(), ..ExecutorConfig::default() };
    let executor = Executor::new(dispatcher, config);

    let result = executor.execute(linear_graph(), "run-2".to_string(), no_cancel(), None).await.unwrap();

    assert!(result.success);
    let metrics = result.retry_metrics.get("a").unwrap();
    assert_eq!(metrics.total_attempts, 3);
    assert_eq!(metrics.transient_failures, 2);
    assert_eq!(metrics.success_count, 1);
}

#[tokio::test]
async fn permanent_error_no_retries() {
    let dispatcher = Arc::new(MockDispatcher::new());
    dispatcher
        .script(
            "a",
            vec![DispatchError::Rpc { code: RpcCode::InvalidArgument, message: "bad query".to_string() }],
            vec![],
        )
        .await;

    let config = ExecutorConfig { retry_policy: fast_retry_policy(), ..ExecutorConfig::default() };
    let executor = Executor::new(dispatcher, config);

    let result = executor.execute(linear_graph(), "run-3".to_string(), no_cancel(), None).await.unwrap();

    assert!(!result.success);
    assert!(result.failed_nodes.contains_key("a"));
    let metrics = result.retry_metrics.get("a").unwrap();
    assert_eq!(metrics.total_attempts, 1);
    assert_eq!(metrics.permanent_failures, 1);
}

#[tokio::test]
async fn sibling_isolation() {
    let dispatcher = Arc::new(MockDispatcher::new());
    dispatcher.script("ok", vec![], vec!["claim".to_string()]).await;
    dispatcher
        .script(
            "bad",
            vec![DispatchError::Rpc { code: RpcCode::InvalidArgument, message: "bad query".to_string() }],
            vec![],
        )
        .await;

    let mut g = Graph::new("g2", "sibling isolation");
    g.nodes.push(Node::new("ok", "researcher"));
    g.nodes.push(Node::new("bad", "researcher"));

    let config = ExecutorConfig { retry_policy: fast_retry_policy(), ..ExecutorConfig::default() };
    let executor = Executor::new(dispatcher, config);

    let result = executor.execute(g, "run-4".to_string(), no_cancel(), None).await.unwrap();

    assert!(result.partial_success);
    assert!(!result.success);
    assert_eq!(result.succeeded_nodes.len(), 1);
    assert_eq!(result.failed_nodes.len(), 1);
}

#[tokio::test]
async fn crash_recovery_preserves_topology_and_in_flight_status() {
    let storage = Arc::new(InMemoryStorage::new());

    let mut g = linear_graph();
    storage.create_graph(&g).await.unwrap();
    hdrp_orchestrator::graph::set_graph_status(&mut g, GraphStatus::Running).unwrap();
    storage.update_graph_status(&g.id, GraphStatus::Running).await.unwrap();

    hdrp_orchestrator::graph::set_node_status(&mut g, "a", NodeStatus::Running).unwrap();
    storage.update_node_status(&g.id, "a", NodeStatus::Running, None).await.unwrap();
    hdrp_orchestrator::graph::set_node_status(&mut g, "a", NodeStatus::Succeeded).unwrap();
    storage.update_node_status(&g.id, "a", NodeStatus::Succeeded, None).await.unwrap();

    hdrp_orchestrator::graph::evaluate_readiness(&mut g);
    hdrp_orchestrator::graph::set_node_status(&mut g, "b", NodeStatus::Running).unwrap();
    storage.update_node_status(&g.id, "b", NodeStatus::Running, None).await.unwrap();

    let recovered = storage.recover_graph(&g.id).await.unwrap();
    let recovered_graph = recovered.graph.expect("snapshot/WAL must reconstruct a graph");
    assert_eq!(recovered_graph.node("a").unwrap().status, NodeStatus::Succeeded);
    assert_eq!(recovered_graph.node("b").unwrap().status, NodeStatus::Running);
    assert_eq!(recovered_graph.edges.len(), 2);
}

#[tokio::test]
async fn dynamic_expansion_admits_relevant_entity_and_blocks_it() {
    let dispatcher = Arc::new(MockDispatcher::new());
    dispatcher.script("root", vec![], vec!["quantum claim".to_string()]).await;

    let mut g = Graph::new("g3", "Quantum Computing");
    g.nodes.push(Node::new("root", "researcher"));

    let config = ExecutorConfig { retry_policy: fast_retry_policy(), ..ExecutorConfig::default() };
    let executor = Executor::new(dispatcher, config);

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    signal_tx
        .send(EntitySignal {
            entity: "Quantum".to_string(),
            source_node_id: "root".to_string(),
            node_type: "agent".to_string(),
        })
        .unwrap();
    drop(signal_tx);

    let result = executor.execute(g, "run-5".to_string(), no_cancel(), Some(signal_rx)).await.unwrap();

    assert!(result.success);
    assert!(result.succeeded_nodes.contains(&"root".to_string()));
}

#[tokio::test]
async fn expansion_rejects_irrelevant_entity_and_depth_limit() {
    let mut g = Graph::new("g4", "Quantum Computing");
    let mut root = Node::new("root", "researcher");
    root.status = NodeStatus::Succeeded;
    g.nodes.push(root);

    let irrelevant = EntitySignal {
        entity: "Banana Recipes".to_string(),
        source_node_id: "root".to_string(),
        node_type: "agent".to_string(),
    };
    assert!(hdrp_orchestrator::graph::handle_signal(&mut g, &irrelevant).is_err());

    g.node_mut("root").unwrap().depth = 2;
    let too_deep = EntitySignal {
        entity: "Quantum".to_string(),
        source_node_id: "root".to_string(),
        node_type: "agent".to_string(),
    };
    assert!(hdrp_orchestrator::graph::handle_signal(&mut g, &too_deep).is_err());
}

#[tokio::test]
async fn failed_root_leaves_dependents_blocked_forever_and_is_reported_as_deadlock() {
    let dispatcher = Arc::new(MockDispatcher::new());
    dispatcher
        .script(
            "a",
            vec![DispatchError::Rpc { code: RpcCode::InvalidArgument, message: "bad query".to_string() }],
            vec![],
        )
        .await;

    let config = ExecutorConfig { retry_policy: fast_retry_policy(), ..ExecutorConfig::default() };
    let executor = Executor::new(dispatcher, config);

    let result = executor.execute(linear_graph(), "run-6".to_string(), no_cancel(), None).await.unwrap();

    assert!(!result.success);
    assert!(result.failed_nodes.contains_key("a"));
    assert!(result.error_message.as_deref().unwrap_or("").contains("deadlock"));
}

#[tokio::test(start_paused = true)]
async fn rate_limiter_blocks_past_capacity_under_paused_time() {
    use hdrp_orchestrator::executor::RateLimiterRegistry;

    let mut limits = HashMap::new();
    limits.insert("researcher".to_string(), 2usize);
    let registry = RateLimiterRegistry::new(limits, 1);

    let _p1 = registry.acquire("researcher").await;
    let _p2 = registry.acquire("researcher").await;

    let third = tokio::time::timeout(Duration::from_millis(50), registry.acquire("researcher")).await;
    assert!(third.is_err(), "third acquire should block while two permits are held");
}
