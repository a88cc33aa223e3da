//! Per-table repositories: static-method structs generic over any
//! `sqlx::Executor` (a bare pool or an open transaction), mirroring the
//! repository pattern used throughout this codebase's database layer.

pub mod edge_repo;
pub mod graph_repo;
pub mod node_repo;
pub mod snapshot_repo;
pub mod wal_repo;

pub use edge_repo::EdgeRepository;
pub use graph_repo::GraphRepository;
pub use node_repo::NodeRepository;
pub use snapshot_repo::SnapshotRepository;
pub use wal_repo::WalRepository;
