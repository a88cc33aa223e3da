//! Health check handlers.

use axum::extract::State;
use axum::Json;

use crate::api::models::{HealthResponse, SystemHealthResponse};
use crate::api::routes::AppState;

/// `GET /health` — liveness only, no storage check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// `GET /api/v1/system/health` — includes storage connectivity.
pub async fn health_detailed(State(state): State<AppState>) -> Json<SystemHealthResponse> {
    match state.storage.count_unreplayed_wal("__healthcheck__").await {
        Ok(_) | Err(crate::storage::StorageError::NotFound(_)) => {
            Json(SystemHealthResponse::new("healthy", "connected"))
        }
        Err(_) => Json(SystemHealthResponse::new("degraded", "unreachable")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_is_always_ok() {
        let Json(body) = health().await;
        assert_eq!(body.status, "healthy");
    }
}
