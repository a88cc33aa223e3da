//! Typed, transport-agnostic interface to the external semantic workers
//! (decompose / research / verify / synthesize).

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::Graph;

/// Structured RPC status code, mirroring the codes a gRPC-style worker
/// transport would surface. Used by [`crate::retry::classify_error`] to
/// decide transient vs. permanent without string-matching when the
/// transport can give us a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    Aborted,
    Internal,
    Unknown,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    FailedPrecondition,
    OutOfRange,
    Unimplemented,
}

/// Errors surfaced by a call through the [`Dispatcher`] trait.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch cancelled: {0}")]
    Cancelled(String),

    #[error("dispatch deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("rpc error ({code:?}): {message}")]
    Rpc { code: RpcCode, message: String },

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeRequest {
    pub query: String,
    pub context: Option<String>,
    pub run_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    pub source_node_id: String,
    pub run_id: String,
    pub config: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub claims: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueRequest {
    pub claims: Vec<String>,
    pub task: String,
    pub run_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueResponse {
    pub results: Vec<String>,
    pub verified_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    pub verification_results: Vec<String>,
    pub context: String,
    pub run_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeResponse {
    pub report: String,
    pub artifact_uri: Option<String>,
}

/// The engine's view of the four external semantic workers. Implementations
/// are transport-specific (see [`http::HttpDispatcher`]); tests use an
/// in-memory mock.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn decompose(&self, req: DecomposeRequest) -> Result<Graph, DispatchError>;
    async fn research(&self, req: ResearchRequest) -> Result<ResearchResponse, DispatchError>;
    async fn critique(&self, req: CritiqueRequest) -> Result<CritiqueResponse, DispatchError>;
    async fn synthesize(&self, req: SynthesizeRequest) -> Result<SynthesizeResponse, DispatchError>;
}
