//! Per-node-type rate limiting: a bounded semaphore of N tokens per type.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Holds one [`tokio::sync::Semaphore`] per node type. `acquire` blocks until
/// a token is free or the operation is cancelled by the caller dropping the
/// future; `try_acquire` never blocks.
#[derive(Clone)]
pub struct RateLimiterRegistry {
    semaphores: Arc<HashMap<String, Arc<Semaphore>>>,
    default_permits: usize,
}

impl RateLimiterRegistry {
    pub fn new(limits: HashMap<String, usize>, default_permits: usize) -> Self {
        let semaphores = limits
            .into_iter()
            .map(|(node_type, n)| (node_type, Arc::new(Semaphore::new(n))))
            .collect();
        Self {
            semaphores: Arc::new(semaphores),
            default_permits,
        }
    }

    fn semaphore_for(&self, node_type: &str) -> Arc<Semaphore> {
        self.semaphores
            .get(node_type)
            .cloned()
            .unwrap_or_else(|| Arc::new(Semaphore::new(self.default_permits)))
    }

    /// Acquire one token for `node_type`, waiting if none are free. Returns
    /// `None` if the semaphore was closed (never happens in normal operation,
    /// kept so cancellation-adjacent callers can treat it like a rejection).
    pub async fn acquire(&self, node_type: &str) -> Option<OwnedRatePermit> {
        let semaphore = self.semaphore_for(node_type);
        semaphore.clone().acquire_owned().await.ok().map(|permit| OwnedRatePermit {
            _permit: permit,
        })
    }

    pub fn try_acquire(&self, node_type: &str) -> Option<OwnedRatePermit> {
        let semaphore = self.semaphore_for(node_type);
        semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| OwnedRatePermit { _permit: permit })
    }
}

/// Held for the duration of one node's execution; dropping it releases the
/// token, so oversubscribed releases are simply never possible.
pub struct OwnedRatePermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_past_capacity() {
        let mut limits = HashMap::new();
        limits.insert("researcher".to_string(), 1);
        let registry = RateLimiterRegistry::new(limits, 4);

        let first = registry.acquire("researcher").await;
        assert!(first.is_some());
        assert!(registry.try_acquire("researcher").is_none());

        drop(first);
        assert!(registry.try_acquire("researcher").is_some());
    }

    #[tokio::test]
    async fn unknown_node_type_uses_default_permits() {
        let registry = RateLimiterRegistry::new(HashMap::new(), 2);
        let a = registry.try_acquire("critic");
        let b = registry.try_acquire("critic");
        assert!(a.is_some());
        assert!(b.is_some());
    }
}
