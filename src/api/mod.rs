//! HTTP control surface: `POST /execute`, health checks, and run/graph
//! observability endpoints, built on `axum` + `tower-http` exactly as the
//! teacher's own `api` module.

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use routes::{create_router, AppState};
