//! Durable, concurrent DAG execution engine for long-running agent
//! pipelines: typed nodes, a strict status state machine, a deterministic
//! parallel scheduler, checkpointed retries with per-node-type circuit
//! breaking, write-ahead-logged persistence, and dynamic graph expansion.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod executor;
pub mod graph;
pub mod retry;
pub mod storage;

pub use config::Config;
pub use executor::{ExecutionResult, Executor, ExecutorConfig};
pub use graph::{Edge, Graph, GraphStatus, Node, NodeStatus};
