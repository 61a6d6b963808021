//! API route configuration.

use axum::Router;
use axum::http::{
    HeaderName, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{self, SESSION_ID_HEADER};
use super::state::AppState;

fn cors() -> CorsLayer {
    let session_id = HeaderName::from_static(SESSION_ID_HEADER);
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, session_id.clone()])
        .expose_headers([session_id])
}

/// Create the router serving `/health` and `/mcp`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/mcp",
            get(handlers::get_mcp)
                .post(handlers::post_mcp)
                .delete(handlers::delete_mcp),
        )
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
