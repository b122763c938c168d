//! HTTP request handlers.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use scipip_core::{PipelineError, PipelineRequest, generate_buffered, stream_pipeline};
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use super::ApiState;
use crate::error::ApiError;

const SERVICE_NAME: &str = "scipip";

/// Build all API routes.
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/generate", post(generate))
}

/// Service description and endpoint map.
async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "description": "Generates research ideas from a research background, \
                        grounded in related literature",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "generate": "POST /generate {\"background\": \"...\", \"stream\": false}",
            "health": "GET /health",
        }
    }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "backend_ready": true,
    }))
}

/// Run the pipeline, buffered or as an SSE stream.
async fn generate(
    State(state): State<ApiState>,
    request: Result<Json<PipelineRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) =
        request.map_err(|rejection| PipelineError::InvalidRequest(rejection.body_text()))?;
    let orchestrator = state.ctx.orchestrator();
    let budget = state.ctx.request_budget();
    info!(stream = request.stream, "generate request");

    if request.stream {
        let rx = stream_pipeline(orchestrator, &request.background, budget)?;
        let events = ReceiverStream::new(rx).map(|event| Event::default().json_data(&event));
        Ok(([(header::CACHE_CONTROL, "no-cache")], Sse::new(events)).into_response())
    } else {
        let response = generate_buffered(orchestrator, &request.background, budget).await?;
        Ok(Json(response).into_response())
    }
}
