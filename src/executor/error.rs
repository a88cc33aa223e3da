//! Errors that can propagate out of [`super::Executor::execute`]. Per-node
//! failures never reach here (§7): only driver-loop invariant breaks do.

use thiserror::Error;

use crate::graph::GraphError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("execution cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
