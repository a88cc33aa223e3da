//! API route definitions: assembles the `Router` and the shared [`AppState`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::Dispatcher;
use crate::executor::{ExecutionResult, Executor};
use crate::storage::Storage;

use super::handlers;

/// A run tracked by the in-process registry: `Running` while the owning
/// `POST /execute` call is still inside `Executor::execute`, `Completed`
/// once it returns.
#[derive(Debug, Clone)]
pub enum RunEntry {
    Running { graph_id: String },
    Completed { result: ExecutionResult },
}

/// Shared application state, cheap to clone (everything behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub executor: Arc<Executor>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub runs: Arc<RwLock<HashMap<String, RunEntry>>>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, executor: Arc<Executor>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            storage,
            executor,
            dispatcher,
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// Build the complete API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/system/health", get(handlers::health_detailed))
        .route("/execute", post(handlers::execute))
        .route("/api/v1/runs/:run_id", get(handlers::get_run))
        .route("/api/v1/graphs/:graph_id", get(handlers::get_graph))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::http::{HttpDispatcher, WorkerAddrs};
    use crate::executor::ExecutorConfig;
    use crate::storage::InMemoryStorage;
    use std::time::Duration;

    #[test]
    fn router_builds_without_panic() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(HttpDispatcher::new(
            WorkerAddrs {
                principal: "http://localhost:9000".to_string(),
                researcher: "http://localhost:9001".to_string(),
                critic: "http://localhost:9002".to_string(),
                synthesizer: "http://localhost:9003".to_string(),
            },
            Duration::from_secs(1),
        ));
        let executor = Arc::new(Executor::new(dispatcher.clone(), ExecutorConfig::default()));
        let state = AppState::new(storage, executor, dispatcher);
        let _router = create_router(state);
    }
}
