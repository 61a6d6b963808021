//! System health and status handlers.

use axum::Json;
use serde::Serialize;
use tracing::instrument;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// How clients authenticate against `/mcp`
    pub authentication: &'static str,
}

/// Health check endpoint. Static; never touches sessions or the backend.
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "superthread-mcp",
        version: env!("CARGO_PKG_VERSION"),
        authentication: "Bearer token required in Authorization header",
    })
}
