use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::app_state::AppState;
use crate::handlers;

/// Create the main application router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // MCP endpoint: GET streams server-initiated frames over SSE,
        // POST accepts JSON-RPC (requests and sampling replies alike).
        .route("/mcp/sse", get(handlers::mcp_sse).post(handlers::mcp_request))
        .route("/mcp", post(handlers::mcp_request))
        // CORS: allow any origin (MCP clients run in various contexts)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
