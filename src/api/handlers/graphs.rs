//! `GET /api/v1/graphs/:graph_id` — current graph snapshot for observability.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiResult;
use crate::api::routes::AppState;
use crate::graph::Graph;

pub async fn get_graph(State(state): State<AppState>, Path(graph_id): Path<String>) -> ApiResult<Json<Graph>> {
    let graph = state.storage.load_graph(&graph_id).await?;
    Ok(Json(graph))
}
