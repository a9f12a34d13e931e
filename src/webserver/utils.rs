/// Response helpers shared by route handlers and middleware
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Error body: `{"error": {"code", "message", "details", "timestamp"}}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// 200 OK with a JSON body
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// JSON error response with a machine-readable code
pub fn error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    details: Option<&str>,
) -> Response {
    let body = ErrorResponse {
        error: ErrorDetails {
            code: code.to_string(),
            message: message.to_string(),
            details: details.map(|d| d.to_string()),
            timestamp: Utc::now(),
        },
    };
    (status, Json(body)).into_response()
}
