//! REST + SSE API for the idea generation pipeline.

pub mod handlers;

use axum::Router;
use scipip_core::AppContext;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state accessible by all API handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub ctx: AppContext,
}

impl ApiState {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

/// Build the API router.
///
/// An empty origin list, or one containing `*`, allows any origin.
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() || cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    handlers::routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
