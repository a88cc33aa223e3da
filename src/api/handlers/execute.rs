//! `POST /execute` — decompose a query into a graph, run it to completion,
//! and return the final `ExecutionResult`.

use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{ExecuteRequest, ExecuteResponse};
use crate::api::routes::{AppState, RunEntry};
use crate::dispatch::DecomposeRequest;

/// `POST /execute`.
///
/// The engine first asks the external decomposer to turn `query` into an
/// initial [`crate::graph::Graph`], then runs it with [`crate::executor::Executor::execute`].
/// The call blocks for the run's full duration; status codes per the HTTP
/// control surface contract: 200 success, 400 invalid input, 504 deadline
/// exceeded, 500 internal.
pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecuteResponse>> {
    req.validate().map_err(ApiError::BadRequest)?;

    let run_id = req.run_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    let graph = state
        .dispatcher
        .decompose(DecomposeRequest {
            query: req.query.clone(),
            context: req.context.clone(),
            run_id: run_id.clone(),
        })
        .await?;

    state.runs.write().await.insert(
        run_id.clone(),
        RunEntry::Running { graph_id: graph.id.clone() },
    );

    let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let result = state.executor.execute(graph, run_id.clone(), cancel_rx, None).await?;

    state
        .runs
        .write()
        .await
        .insert(run_id.clone(), RunEntry::Completed { result: result.clone() });

    tracing::info!(run_id, success = result.success, "run completed");
    Ok(Json(result.into()))
}
