//! Per-(run, node) checkpoint store used to resume a retry loop across
//! process restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// State needed to resume a node's retry loop: which attempt comes next,
/// and the error that caused the previous one to stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub node_id: String,
    pub next_attempt: u32,
    pub last_error: Option<String>,
}

/// Abstract CRUD over checkpoints keyed by `(run_id, node_id)`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
    /// Returns a zero-value checkpoint (attempt 0, no error) if none is stored.
    async fn load(&self, run_id: &str, node_id: &str) -> Result<Checkpoint>;
    async fn delete(&self, run_id: &str, node_id: &str) -> Result<()>;
    async fn list_all(&self, run_id: &str) -> Result<Vec<Checkpoint>>;
    async fn delete_all(&self, run_id: &str) -> Result<()>;
}

/// In-memory checkpoint store. Grounded on the same
/// `Arc<RwLock<HashMap<...>>>` shape used elsewhere in this codebase for
/// small, test-friendly in-process state.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    entries: Arc<RwLock<HashMap<(String, String), Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.entries.write().await.insert(
            (checkpoint.run_id.clone(), checkpoint.node_id.clone()),
            checkpoint.clone(),
        );
        Ok(())
    }

    async fn load(&self, run_id: &str, node_id: &str) -> Result<Checkpoint> {
        let key = (run_id.to_string(), node_id.to_string());
        Ok(self
            .entries
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Checkpoint {
                run_id: run_id.to_string(),
                node_id: node_id.to_string(),
                next_attempt: 0,
                last_error: None,
            }))
    }

    async fn delete(&self, run_id: &str, node_id: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .remove(&(run_id.to_string(), node_id.to_string()));
        Ok(())
    }

    async fn list_all(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|c| c.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn delete_all(&self, run_id: &str) -> Result<()> {
        self.entries.write().await.retain(|k, _| k.0 != run_id);
        Ok(())
    }
}

/// Filesystem checkpoint store: one JSON file per `(run_id, node_id)` at
/// `<base>/<run_id>/<node_id>.json`.
#[derive(Clone)]
pub struct FileCheckpointStore {
    base: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path(&self, run_id: &str, node_id: &str) -> PathBuf {
        self.base.join(run_id).join(format!("{node_id}.json"))
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base.join(run_id)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path(&checkpoint.run_id, &checkpoint.node_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        fs::write(path, bytes).await?;
        Ok(())
    }

    async fn load(&self, run_id: &str, node_id: &str) -> Result<Checkpoint> {
        let path = self.path(run_id, node_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Checkpoint {
                run_id: run_id.to_string(),
                node_id: node_id.to_string(),
                next_attempt: 0,
                last_error: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, run_id: &str, node_id: &str) -> Result<()> {
        let path = self.path(run_id, node_id);
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        let dir = self.run_dir(run_id);
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let bytes = fs::read(entry.path()).await?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    async fn delete_all(&self, run_id: &str) -> Result<()> {
        match fs::remove_dir_all(self.run_dir(run_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_round_trip() {
        let store = InMemoryCheckpointStore::new();
        let cp = Checkpoint {
            run_id: "r1".into(),
            node_id: "n1".into(),
            next_attempt: 2,
            last_error: Some("boom".into()),
        };
        store.save(&cp).await.unwrap();
        let loaded = store.load("r1", "n1").await.unwrap();
        assert_eq!(loaded.next_attempt, 2);
    }

    #[tokio::test]
    async fn memory_missing_returns_zero_value() {
        let store = InMemoryCheckpointStore::new();
        let loaded = store.load("r1", "missing").await.unwrap();
        assert_eq!(loaded.next_attempt, 0);
        assert!(loaded.last_error.is_none());
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let cp = Checkpoint {
            run_id: "r1".into(),
            node_id: "n1".into(),
            next_attempt: 1,
            last_error: None,
        };
        store.save(&cp).await.unwrap();
        let loaded = store.load("r1", "n1").await.unwrap();
        assert_eq!(loaded.next_attempt, 1);

        store.delete("r1", "n1").await.unwrap();
        let loaded = store.load("r1", "n1").await.unwrap();
        assert_eq!(loaded.next_attempt, 0);
    }
}
