//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scipip_core::PipelineError;
use serde::Serialize;
use tracing::{error, warn};

/// A pipeline failure rendered as `{ "detail": ..., "kind": ... }`.
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    kind: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), error = %self.0, "generate request failed");
        } else {
            warn!(kind = self.0.kind(), error = %self.0, "generate request rejected");
        }
        let body = ErrorBody {
            detail: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}
