//! Uniform `{type:"error"}`-shaped REST error responses, mapping the shared
//! [`ErrorKind`] taxonomy onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator_core::ErrorKind;
use serde_json::json;

pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn from_err<E: orchestrator_core::HasErrorKind + std::fmt::Display>(e: E) -> Self {
        Self { kind: e.kind(), message: e.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::ValidationError | ErrorKind::SchemaError => StatusCode::BAD_REQUEST,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::BudgetExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::TransportError | ErrorKind::ExecutorError | ErrorKind::ProviderError | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.message, "kind": self.kind }))).into_response()
    }
}
