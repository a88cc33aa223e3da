//! `GET /api/v1/runs/:run_id` — observability over a run tracked by the
//! in-process run registry.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::RunStatusResponse;
use crate::api::routes::{AppState, RunEntry};

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunStatusResponse>> {
    let runs = state.runs.read().await;
    match runs.get(&run_id) {
        Some(RunEntry::Running { graph_id }) => Ok(Json(RunStatusResponse::Running {
            run_id,
            graph_id: graph_id.clone(),
        })),
        Some(RunEntry::Completed { result }) => Ok(Json(RunStatusResponse::Completed { result: result.clone() })),
        None => Err(ApiError::NotFound(format!("run not found: {run_id}"))),
    }
}
