//! Graph data model, structural validation, the node/graph state machine,
//! the scheduler, and runtime expansion via discovery signals.

pub mod error;
pub mod model;
pub mod scheduler;
pub mod signal;
pub mod state_machine;
pub mod validate;

pub use error::{GraphError, Result};
pub use model::{Edge, Graph, GraphStatus, Node, NodeStatus, RESERVED_CONFIG_KEYS};
pub use scheduler::{schedule_next, schedule_next_batch};
pub use signal::{handle_signal, EntitySignal};
pub use state_machine::{evaluate_readiness, set_graph_status, set_node_status};
pub use validate::{validate, MAX_DEPTH};
