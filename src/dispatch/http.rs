//! HTTP/JSON implementation of [`Dispatcher`] against the four worker
//! endpoints named in configuration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::graph::Graph;

use super::{
    CritiqueRequest, CritiqueResponse, DecomposeRequest, DispatchError, Dispatcher, RpcCode,
    ResearchRequest, ResearchResponse, SynthesizeRequest, SynthesizeResponse,
};

/// Worker endpoints, one per role.
#[derive(Debug, Clone)]
pub struct WorkerAddrs {
    pub principal: String,
    pub researcher: String,
    pub critic: String,
    pub synthesizer: String,
}

/// Dispatches to workers over HTTP, posting each request as JSON and
/// decoding the JSON response body.
pub struct HttpDispatcher {
    client: Client,
    addrs: WorkerAddrs,
}

impl HttpDispatcher {
    pub fn new(addrs: WorkerAddrs, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client config is static and known-valid");
        Self { client, addrs }
    }

    async fn post<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Resp, DispatchError> {
        debug!(url, "dispatching worker request");
        let resp = self.client.post(url).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                DispatchError::DeadlineExceeded(e.to_string())
            } else if e.is_connect() {
                DispatchError::Network(e.to_string())
            } else {
                DispatchError::Message(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            let code = match resp.status().as_u16() {
                503 => RpcCode::Unavailable,
                504 => RpcCode::DeadlineExceeded,
                429 => RpcCode::ResourceExhausted,
                500 => RpcCode::Internal,
                400 => RpcCode::InvalidArgument,
                404 => RpcCode::NotFound,
                409 => RpcCode::AlreadyExists,
                403 => RpcCode::PermissionDenied,
                401 => RpcCode::Unauthenticated,
                412 => RpcCode::FailedPrecondition,
                416 => RpcCode::OutOfRange,
                501 => RpcCode::Unimplemented,
                _ => RpcCode::Unknown,
            };
            let message = resp.text().await.unwrap_or_default();
            warn!(url, code = ?code, "worker returned error status");
            return Err(DispatchError::Rpc { code, message });
        }

        resp.json::<Resp>()
            .await
            .map_err(|e| DispatchError::Message(format!("decode error: {e}")))
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn decompose(&self, req: DecomposeRequest) -> Result<Graph, DispatchError> {
        self.post(&format!("{}/decompose", self.addrs.principal), &req).await
    }

    async fn research(&self, req: ResearchRequest) -> Result<ResearchResponse, DispatchError> {
        self.post(&format!("{}/research", self.addrs.researcher), &req).await
    }

    async fn critique(&self, req: CritiqueRequest) -> Result<CritiqueResponse, DispatchError> {
        self.post(&format!("{}/critique", self.addrs.critic), &req).await
    }

    async fn synthesize(&self, req: SynthesizeRequest) -> Result<SynthesizeResponse, DispatchError> {
        self.post(&format!("{}/synthesize", self.addrs.synthesizer), &req).await
    }
}
