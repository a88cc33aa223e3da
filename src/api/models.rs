//! Request/response DTOs for the HTTP control surface.

use serde::{Deserialize, Serialize};

use crate::executor::ExecutionResult;

/// Body of `POST /execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub query: String,
    pub run_id: Option<String>,
    pub context: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl ExecuteRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        Ok(())
    }
}

/// Body returned by `POST /execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResponse {
    pub run_id: String,
    pub success: bool,
    pub report: Option<String>,
    pub artifact_uri: Option<String>,
    pub error_message: Option<String>,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            run_id: result.run_id,
            success: result.success,
            report: result.final_report,
            artifact_uri: result.artifact_uri,
            error_message: result.error_message,
        }
    }
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self { status: "healthy".to_string() }
    }
}

/// Body returned by `GET /api/v1/system/health`.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealthResponse {
    pub status: String,
    pub storage: String,
    pub version: String,
    pub timestamp: String,
}

impl SystemHealthResponse {
    pub fn new(status: impl Into<String>, storage: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            storage: storage.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Status of a run as tracked by the in-process run registry, returned by
/// `GET /api/v1/runs/:run_id`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatusResponse {
    Running { run_id: String, graph_id: String },
    Completed { result: ExecutionResult },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_fails_validation() {
        let req = ExecuteRequest {
            query: "   ".to_string(),
            run_id: None,
            context: None,
            provider: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn non_empty_query_passes_validation() {
        let req = ExecuteRequest {
            query: "quantum computing".to_string(),
            run_id: None,
            context: None,
            provider: None,
        };
        assert!(req.validate().is_ok());
    }
}
