//! Per-node execution locks: in-memory by default, with a pluggable trait
//! so an external coordinator (etcd/Redis) can be swapped in later.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);
const ACQUIRE_RETRIES: u32 = 3;
const ACQUIRE_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("node {0} is already locked")]
    AlreadyLocked(String),
    #[error("lock backend not implemented")]
    NotImplemented,
}

#[async_trait]
pub trait NodeLockManager: Send + Sync {
    /// Attempt one acquisition, no retry. `owner` identifies the caller so a
    /// lock can later be released by the same party that took it.
    async fn try_lock(&self, run_id: &str, node_id: &str, owner: &str) -> Result<(), LockError>;
    async fn unlock(&self, run_id: &str, node_id: &str, owner: &str);
}

struct Held {
    owner: String,
    expires_at: Instant,
}

/// Map `(run_id, node_id) -> owner+expiry`. Expired entries are swept lazily
/// on the next `try_lock` for that key rather than by a background task,
/// since this engine's node counts don't warrant one.
#[derive(Clone)]
pub struct InMemoryLockManager {
    locks: Arc<Mutex<HashMap<(String, String), Held>>>,
    ttl: Duration,
}

impl InMemoryLockManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TTL)
    }
}

#[async_trait]
impl NodeLockManager for InMemoryLockManager {
    async fn try_lock(&self, run_id: &str, node_id: &str, owner: &str) -> Result<(), LockError> {
        let key = (run_id.to_string(), node_id.to_string());
        let mut locks = self.locks.lock();
        if let Some(held) = locks.get(&key) {
            if held.expires_at > Instant::now() && held.owner != owner {
                return Err(LockError::AlreadyLocked(node_id.to_string()));
            }
        }
        locks.insert(
            key,
            Held {
                owner: owner.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn unlock(&self, run_id: &str, node_id: &str, owner: &str) {
        let key = (run_id.to_string(), node_id.to_string());
        let mut locks = self.locks.lock();
        if let Some(held) = locks.get(&key) {
            if held.owner == owner {
                locks.remove(&key);
            }
        }
    }
}

/// Stub for an external coordinator backend. Always rejects so the caller
/// falls back to in-memory locking, per configuration.
pub struct ExternalLockManager;

#[async_trait]
impl NodeLockManager for ExternalLockManager {
    async fn try_lock(&self, _run_id: &str, _node_id: &str, _owner: &str) -> Result<(), LockError> {
        Err(LockError::NotImplemented)
    }

    async fn unlock(&self, _run_id: &str, _node_id: &str, _owner: &str) {}
}

/// Acquire with bounded retry, as worker tasks do before starting a node.
pub async fn acquire_with_retry(
    manager: &dyn NodeLockManager,
    run_id: &str,
    node_id: &str,
    owner: &str,
) -> Result<(), LockError> {
    let mut last_err = LockError::AlreadyLocked(node_id.to_string());
    for _ in 0..ACQUIRE_RETRIES {
        match manager.try_lock(run_id, node_id, owner).await {
            Ok(()) => return Ok(()),
            Err(LockError::NotImplemented) => return Err(LockError::NotImplemented),
            Err(e) => {
                last_err = e;
                tokio::time::sleep(ACQUIRE_RETRY_DELAY).await;
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_owner_is_rejected_until_released() {
        let manager = InMemoryLockManager::new(DEFAULT_LOCK_TTL);
        manager.try_lock("r1", "a", "owner1").await.unwrap();
        assert!(manager.try_lock("r1", "a", "owner2").await.is_err());

        manager.unlock("r1", "a", "owner1").await;
        assert!(manager.try_lock("r1", "a", "owner2").await.is_ok());
    }

    #[tokio::test]
    async fn same_owner_can_relock() {
        let manager = InMemoryLockManager::new(DEFAULT_LOCK_TTL);
        manager.try_lock("r1", "a", "owner1").await.unwrap();
        assert!(manager.try_lock("r1", "a", "owner1").await.is_ok());
    }

    #[tokio::test]
    async fn external_manager_always_not_implemented() {
        let manager = ExternalLockManager;
        assert!(matches!(
            manager.try_lock("r1", "a", "owner1").await,
            Err(LockError::NotImplemented)
        ));
    }
}
