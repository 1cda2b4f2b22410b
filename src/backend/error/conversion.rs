/**
 * Error Conversion
 *
 * `IntoResponse` for `ApiError`, producing the JSON error envelope:
 *
 * ```json
 * {
 *   "status": "error",
 *   "error": "Too many attempts, retry in 30s",
 *   "code": "RATE_LIMITED",
 *   "retry_after": 30
 * }
 * ```
 *
 * Validation errors additionally carry a `details` array with every unmet
 * rule. Internal errors are logged with their detail but rendered with a
 * generic message.
 */
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::backend::error::types::ApiError;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        if let ApiError::Internal(detail) = &self {
            tracing::error!("internal error: {}", detail);
        }

        let mut body = serde_json::json!({
            "status": "error",
            "error": self.to_string(),
            "code": code,
        });
        match &self {
            ApiError::Validation { errors } => {
                body["details"] = serde_json::json!(errors);
            }
            ApiError::RateLimited { retry_after_secs } => {
                body["retry_after"] = serde_json::json!(retry_after_secs);
            }
            _ => {}
        }

        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json");
        if let ApiError::RateLimited { retry_after_secs } = &self {
            builder = builder.header(header::RETRY_AFTER, retry_after_secs.to_string());
        }

        builder
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| {
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::from("Internal Server Error"))
                    .unwrap()
            })
    }
}
