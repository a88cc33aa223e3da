//! Per-node-type circuit breaker.
//!
//! Unlike a simple consecutive-failure counter, this breaker opens on a
//! *failure rate* observed over a minimum request window, which avoids
//! tripping on a single early failure before enough signal has accumulated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Failure rate (0.0-1.0) at or above which the circuit opens.
    pub failure_threshold: f64,
    /// Minimum total requests observed before the failure rate is evaluated.
    pub min_requests: u32,
    /// Time the circuit stays open before allowing a half-open probe.
    pub open_timeout: Duration,
    /// Consecutive half-open successes required to close the circuit.
    pub half_open_probe_budget: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            min_requests: 10,
            open_timeout: Duration::from_secs(30),
            half_open_probe_budget: 3,
        }
    }
}

struct NodeTypeState {
    state: CircuitState,
    total: u32,
    failures: u32,
    opened_at: Option<Instant>,
    half_open_successes: u32,
    half_open_inflight: u32,
}

impl NodeTypeState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            total: 0,
            failures: 0,
            opened_at: None,
            half_open_successes: 0,
            half_open_inflight: 0,
        }
    }

    fn reset_counters(&mut self) {
        self.total = 0;
        self.failures = 0;
        self.half_open_successes = 0;
        self.half_open_inflight = 0;
    }
}

/// A registry of circuit breakers, one state machine per node type.
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    states: Arc<Mutex<HashMap<String, NodeTypeState>>>,
}

/// Outcome of [`CircuitBreakerRegistry::allow`]: whether the caller should
/// proceed, and if this call counts as a half-open probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether a call for `node_type` may proceed right now.
    pub fn allow(&self, node_type: &str) -> Admission {
        let mut states = self.states.lock();
        let entry = states
            .entry(node_type.to_string())
            .or_insert_with(NodeTypeState::new);

        match entry.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::HalfOpen => {
                if entry.half_open_inflight < self.config.half_open_probe_budget {
                    entry.half_open_inflight += 1;
                    Admission::Allowed
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::Open => {
                let elapsed = entry.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_timeout {
                    debug!(node_type, "circuit transitioning to half-open");
                    entry.state = CircuitState::HalfOpen;
                    entry.half_open_inflight = 1;
                    Admission::Allowed
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    pub fn record_success(&self, node_type: &str) {
        let mut states = self.states.lock();
        let entry = states
            .entry(node_type.to_string())
            .or_insert_with(NodeTypeState::new);

        match entry.state {
            CircuitState::HalfOpen => {
                entry.half_open_successes += 1;
                if entry.half_open_successes >= self.config.half_open_probe_budget {
                    entry.state = CircuitState::Closed;
                    entry.reset_counters();
                }
            }
            CircuitState::Closed => {
                entry.total += 1;
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, node_type: &str) {
        let mut states = self.states.lock();
        let entry = states
            .entry(node_type.to_string())
            .or_insert_with(NodeTypeState::new);

        match entry.state {
            CircuitState::HalfOpen => {
                warn!(node_type, "half-open probe failed, reopening circuit");
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Instant::now());
                entry.reset_counters();
            }
            CircuitState::Closed => {
                entry.total += 1;
                entry.failures += 1;
                if entry.total >= self.config.min_requests
                    && (entry.failures as f64 / entry.total as f64) >= self.config.failure_threshold
                {
                    warn!(
                        node_type,
                        failures = entry.failures,
                        total = entry.total,
                        "circuit opening on failure rate"
                    );
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state_of(&self, node_type: &str) -> CircuitState {
        self.states
            .lock()
            .get(node_type)
            .map(|s| s.state)
            .unwrap_or(CircuitState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 0.5,
            min_requests: 10,
            open_timeout: Duration::from_millis(20),
            half_open_probe_budget: 2,
        }
    }

    #[test]
    fn stays_closed_under_min_requests() {
        let reg = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..9 {
            reg.record_failure("researcher");
        }
        assert_eq!(reg.state_of("researcher"), CircuitState::Closed);
    }

    #[test]
    fn opens_once_rate_and_window_met() {
        let reg = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..5 {
            reg.record_success("researcher");
        }
        for _ in 0..5 {
            reg.record_failure("researcher");
        }
        assert_eq!(reg.state_of("researcher"), CircuitState::Open);
        assert_eq!(reg.allow("researcher"), Admission::Rejected);
    }

    #[tokio::test]
    async fn half_opens_after_timeout_and_closes_on_probes() {
        let reg = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..10 {
            reg.record_failure("critic");
        }
        assert_eq!(reg.state_of("critic"), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(reg.allow("critic"), Admission::Allowed);
        assert_eq!(reg.state_of("critic"), CircuitState::HalfOpen);

        reg.record_success("critic");
        reg.record_success("critic");
        assert_eq!(reg.state_of("critic"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let reg = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..10 {
            reg.record_failure("synthesizer");
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(reg.allow("synthesizer"), Admission::Allowed);
        reg.record_failure("synthesizer");
        assert_eq!(reg.state_of("synthesizer"), CircuitState::Open);
    }
}
