//! AI analysis orchestration pipeline.
//!
//! Two pipelines share this module:
//! - photo analysis: clinical context + 1–5 image references → vision model
//!   → schema-validated [`schema::PhotoAnalysisReport`], with a deterministic
//!   mock fallback when the model is unreachable after retries;
//! - diagnosis synthesis: assembled clinical context → text model →
//!   schema-validated [`schema::DiagnosisReport`], no fallback.
//!
//! All model I/O goes through the [`model::ChatModel`] trait so both
//! pipelines are testable with scripted transports.

pub mod context;
pub mod cost;
pub mod mock;
pub mod model;
pub mod prompt;
pub mod retry;
pub mod schema;
pub mod synthesis;
pub mod vision;

use thiserror::Error;

use schema::SchemaError;

/// Failures from the model-facing side of the pipeline.
///
/// The retry loop consults [`AiError::is_retryable`] to decide whether a
/// failed attempt consumes a retry or terminates the call immediately.
#[derive(Error, Debug)]
pub enum AiError {
    /// Missing or rejected provider credential. Terminal — retrying cannot help.
    #[error("AI provider configuration error: {0}")]
    Configuration(String),

    /// Upstream rate limit. Retryable; `retry_after` comes from the provider
    /// when it sent one.
    #[error("AI provider rate limit reached")]
    RateLimited { retry_after: Option<u64> },

    /// The attempt exceeded its wall-clock budget. Retryable.
    #[error("model request timed out after {0}s")]
    Timeout(u64),

    /// Transport-level failure reaching the provider. Retryable.
    #[error("network error reaching AI provider: {0}")]
    Network(String),

    /// Non-success status from the provider. 5xx is retryable; other 4xx
    /// indicate a request the provider will never accept.
    #[error("AI provider returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The provider rejected an attached image. Terminal.
    #[error("unusable image: {0}")]
    InvalidImage(String),

    /// The model answered but the answer failed schema validation.
    /// Consumes a retry attempt like any transient failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Image count outside 1..=5. Rejected before any outbound call.
    #[error("image count {0} outside allowed range 1..=5")]
    ImageCount(usize),
}

impl AiError {
    /// Whether another attempt against the provider could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::RateLimited { .. }
            | AiError::Timeout(_)
            | AiError::Network(_)
            | AiError::Schema(_) => true,
            AiError::Upstream { status, .. } => *status >= 500,
            AiError::Configuration(_) | AiError::InvalidImage(_) | AiError::ImageCount(_) => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(AiError::Timeout(25).is_retryable());
        assert!(AiError::Network("connection reset".into()).is_retryable());
        assert!(AiError::RateLimited { retry_after: Some(60) }.is_retryable());
        assert!(AiError::Upstream { status: 502, body: "bad gateway".into() }.is_retryable());
    }

    #[test]
    fn configuration_errors_are_terminal() {
        assert!(!AiError::Configuration("missing API key".into()).is_retryable());
        assert!(!AiError::InvalidImage("unsupported format".into()).is_retryable());
        assert!(!AiError::ImageCount(0).is_retryable());
    }

    #[test]
    fn client_side_upstream_errors_are_terminal() {
        let err = AiError::Upstream { status: 400, body: "bad request".into() };
        assert!(!err.is_retryable());
    }

    #[test]
    fn schema_failures_consume_a_retry() {
        let err: AiError = SchemaError::NoJson.into();
        assert!(err.is_retryable());
    }
}
