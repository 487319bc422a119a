use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Request-level failures. Every variant maps to a JSON body of the shape
/// `{"success": false, "error": <message>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid document: {0}")]
    MalformedDocument(String),

    #[error("File too large (max {0} bytes)")]
    PayloadTooLarge(usize),

    #[error("Failed to generate response: {0}")]
    Model(String),

    #[error("Failed to load history: {0}")]
    Storage(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) | ApiError::MalformedDocument(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Model(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
