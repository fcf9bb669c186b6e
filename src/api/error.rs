//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::pipeline::vision::{MAX_IMAGES, MIN_IMAGES};
use crate::pipeline::AiError;
use crate::store::StoreError;

/// Image formats the vision provider accepts, echoed in 422 bodies.
pub const SUPPORTED_IMAGE_FORMATS: [&str; 4] = ["JPEG", "PNG", "WebP", "GIF"];

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    /// Malformed payload, answered with a corrected example.
    #[error("Invalid request: {message}")]
    BadRequestWithExample {
        message: String,
        example: serde_json::Value,
    },
    #[error("Unusable image: {0}")]
    InvalidImage(String),
    #[error("Unprocessable request: {0}")]
    Unprocessable(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },
    #[error("AI provider not configured")]
    AiConfiguration,
    #[error("AI provider unavailable: {0}")]
    AiUnavailable(String),
    #[error("AI provider timed out after {0}s")]
    AiTimeout(u64),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(detail) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", detail.clone())
            }
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone())
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::BadRequestWithExample { message, .. } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.clone())
            }
            ApiError::InvalidImage(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_IMAGE",
                detail.clone(),
            ),
            ApiError::Unprocessable(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE",
                detail.clone(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                match retry_after {
                    Some(secs) => format!("Rate limit exceeded. Retry after {secs}s"),
                    None => "Rate limit exceeded. Retry later".to_string(),
                },
            ),
            ApiError::AiConfiguration => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI_CONFIG",
                "AI provider not configured".to_string(),
            ),
            ApiError::AiUnavailable(detail) => (
                StatusCode::BAD_GATEWAY,
                "AI_UNAVAILABLE",
                detail.clone(),
            ),
            ApiError::AiTimeout(secs) => (
                StatusCode::GATEWAY_TIMEOUT,
                "AI_TIMEOUT",
                format!("AI provider timed out after {secs}s"),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = json!({ "error": message, "code": code });
        match &self {
            ApiError::BadRequestWithExample { example, .. } => {
                body["example"] = example.clone();
            }
            ApiError::InvalidImage(_) => {
                body["supported_formats"] = json!(SUPPORTED_IMAGE_FORMATS);
            }
            ApiError::RateLimited {
                retry_after: Some(secs),
            } => {
                body["retry_after"] = json!(secs);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited {
            retry_after: Some(secs),
        } = &self
        {
            if let Ok(val) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => ApiError::NotFound(entity.to_string()),
            StoreError::Backend(detail) => ApiError::Internal(detail),
            StoreError::SignUrl(detail) => {
                ApiError::Unprocessable(format!("cannot sign storage path: {detail}"))
            }
        }
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Configuration(detail) => {
                tracing::error!(detail, "AI provider misconfigured");
                ApiError::AiConfiguration
            }
            AiError::RateLimited { retry_after } => ApiError::RateLimited { retry_after },
            AiError::Timeout(secs) => ApiError::AiTimeout(secs),
            AiError::Network(detail) => ApiError::AiUnavailable(detail),
            AiError::Upstream { status, .. } => {
                ApiError::AiUnavailable(format!("provider returned status {status}"))
            }
            AiError::InvalidImage(detail) => ApiError::InvalidImage(detail),
            AiError::Schema(_) => {
                ApiError::AiUnavailable("model returned an invalid report".to_string())
            }
            AiError::ImageCount(n) => ApiError::BadRequest(format!(
                "between {MIN_IMAGES} and {MAX_IMAGES} images required, got {n}"
            )),
        }
    }
}
