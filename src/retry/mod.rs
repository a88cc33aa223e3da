//! Fault tolerance: error classification, backoff policy, per-node-type
//! circuit breaking, and the checkpointed retry loop that ties them together.

pub mod backoff;
pub mod checkpoint;
pub mod circuit;
pub mod classify;

pub use backoff::RetryPolicy;
pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use circuit::{Admission, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use classify::{classify_error, ErrorClass};

use std::future::Future;

use tracing::{debug, info, warn};

use crate::dispatch::DispatchError;

/// Per-attempt outcome of [`run_with_retry`], surfaced for metrics.
#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_attempts: u32,
    pub success_count: u32,
    pub transient_failures: u32,
    pub permanent_failures: u32,
    pub circuit_rejections: u32,
}

/// Why [`run_with_retry`] stopped without a success.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    Failed { last_error: String, metrics: RetryMetrics },
    CircuitOpen { metrics: RetryMetrics },
}

/// Run `op` under the node-type circuit breaker and the given retry policy,
/// checkpointing progress after every failed attempt so a crash can resume
/// from `checkpoint.next_attempt` instead of the beginning.
///
/// `op` receives the 0-indexed attempt number.
pub async fn run_with_retry<F, Fut, T>(
    node_type: &str,
    run_id: &str,
    node_id: &str,
    policy: &RetryPolicy,
    breaker: &CircuitBreakerRegistry,
    checkpoints: &dyn CheckpointStore,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DispatchError>>,
{
    let mut metrics = RetryMetrics::default();

    let starting_checkpoint = checkpoints.load(run_id, node_id).await.unwrap_or_default();
    let start_attempt = starting_checkpoint.next_attempt;

    for attempt in start_attempt..policy.max_attempts() {
        if breaker.allow(node_type) == Admission::Rejected {
            metrics.circuit_rejections += 1;
            warn!(node_type, node_id, "circuit open, short-circuiting call");
            return RetryOutcome::CircuitOpen { metrics };
        }

        metrics.total_attempts += 1;
        match op(attempt).await {
            Ok(value) => {
                metrics.success_count += 1;
                breaker.record_success(node_type);
                let _ = checkpoints.delete(run_id, node_id).await;
                if attempt > 0 {
                    info!(node_id, attempt, "node succeeded after retry");
                }
                return RetryOutcome::Success(value);
            }
            Err(e) => {
                let class = classify_error(&e);
                breaker.record_failure(node_type);

                debug!(node_id, attempt, error = %e, classification = ?class, "node attempt failed");

                match class {
                    ErrorClass::Permanent => {
                        metrics.permanent_failures += 1;
                        return RetryOutcome::Failed {
                            last_error: e.to_string(),
                            metrics,
                        };
                    }
                    ErrorClass::Transient | ErrorClass::Unknown => {
                        metrics.transient_failures += 1;

                        if attempt + 1 >= policy.max_attempts() {
                            return RetryOutcome::Failed {
                                last_error: e.to_string(),
                                metrics,
                            };
                        }

                        let cp = Checkpoint {
                            run_id: run_id.to_string(),
                            node_id: node_id.to_string(),
                            next_attempt: attempt + 1,
                            last_error: Some(e.to_string()),
                        };
                        let _ = checkpoints.save(&cp).await;

                        let delay = policy.delay_for_attempt(attempt);
                        warn!(node_id, attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    RetryOutcome::Failed {
        last_error: format!("node '{node_id}' exhausted all retries"),
        metrics,
    }
}
