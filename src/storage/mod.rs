//! Durable persistence: graph/node/edge CRUD, the write-ahead log, and
//! snapshotting, behind one `Storage` trait with an in-memory and a SQLite
//! implementation.

pub mod error;
pub mod memory;
pub mod repositories;
pub mod sqlite;
pub mod wal;

pub use error::{Result, StorageError};
pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;
pub use wal::{Mutation, RecoveredGraphState, WalEntry};

use async_trait::async_trait;

use crate::graph::{Edge, Graph, GraphStatus, Node, NodeStatus};

/// A snapshot is created once unreplayed WAL entries reach this count.
pub const SNAPSHOT_WAL_THRESHOLD: i64 = 100;

/// Once a snapshot is taken at sequence `s`, replayed WAL entries older
/// than `s - SNAPSHOT_PRUNE_MARGIN` are safe to delete.
pub const SNAPSHOT_PRUNE_MARGIN: i64 = 100;

/// Abstract durable store for graph state and its WAL.
///
/// Every mutating method appends to the WAL before (or atomically with)
/// applying the change to the graph/node/edge tables — the WAL-before-apply
/// invariant is internal to each implementation rather than exposed as a
/// separate transaction handle to callers.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_graph(&self, graph: &Graph) -> Result<i64>;
    async fn load_graph(&self, graph_id: &str) -> Result<Graph>;
    async fn update_graph_status(&self, graph_id: &str, status: GraphStatus) -> Result<i64>;

    async fn add_node(&self, graph_id: &str, node: &Node) -> Result<i64>;
    async fn update_node_status(
        &self,
        graph_id: &str,
        node_id: &str,
        status: NodeStatus,
        last_error: Option<String>,
    ) -> Result<i64>;
    async fn add_edge(&self, graph_id: &str, edge: &Edge) -> Result<i64>;

    async fn record_signal(&self, graph_id: &str, entity: &str, source_node_id: &str) -> Result<i64>;

    async fn get_unreplayed_wal(&self, graph_id: &str) -> Result<Vec<WalEntry>>;
    async fn mark_wal_replayed(&self, graph_id: &str, upto_seq: i64) -> Result<()>;
    async fn count_unreplayed_wal(&self, graph_id: &str) -> Result<i64>;

    async fn save_snapshot(&self, graph_id: &str, sequence_num: i64, data: Vec<u8>) -> Result<()>;
    async fn load_snapshot(&self, graph_id: &str) -> Result<Option<(i64, Vec<u8>)>>;

    /// Reconstruct state by loading the latest snapshot then replaying every
    /// WAL entry with a higher sequence number, in order.
    async fn recover_graph(&self, graph_id: &str) -> Result<RecoveredGraphState>;

    /// Snapshot-and-prune if warranted; no-op otherwise.
    async fn maybe_snapshot(&self, graph_id: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
pub(crate) fn snapshot_should_run(unreplayed: i64) -> bool {
    unreplayed >= SNAPSHOT_WAL_THRESHOLD
}
