//! Retry policy: a pure backoff function separated from the I/O loop,
//! so retry timing is testable without real waiting.

use std::time::Duration;

use super::model::{ChatModel, ModelRequest};
use super::schema::SchemaError;
use super::AiError;

/// Longest single backoff wait, regardless of attempt number.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff: base delay doubling per attempt.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before retrying after failed attempt number `attempt`
    /// (zero-based): base, 2×base, 4×base, ... capped at [`MAX_DELAY`].
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(MAX_DELAY)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Outcome of a successful retried call.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Total outbound attempts made, including the successful one.
    pub attempts: u32,
}

/// Call the model and parse its answer, retrying on retryable failures.
///
/// Makes at most `max_retries + 1` outbound attempts. A schema-invalid
/// answer consumes an attempt like any transient failure. Terminal errors
/// (credential, unusable image) propagate immediately. Backoff waits block
/// only this request's task.
pub async fn call_with_retry<T>(
    model: &dyn ChatModel,
    request: &ModelRequest,
    max_retries: u32,
    backoff: BackoffPolicy,
    parse: impl Fn(&str) -> Result<T, SchemaError>,
) -> Result<RetryOutcome<T>, AiError> {
    let mut last_error: Option<AiError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff.delay(attempt - 1)).await;
        }

        let raw = match model.complete(request).await {
            Ok(raw) => raw,
            Err(e) if e.is_retryable() && attempt < max_retries => {
                tracing::warn!(
                    model = %request.model,
                    attempt = attempt + 1,
                    error = %e,
                    "model call failed, retrying"
                );
                last_error = Some(e);
                continue;
            }
            Err(e) => return Err(e),
        };

        match parse(&raw) {
            Ok(value) => {
                return Ok(RetryOutcome { value, attempts: attempt + 1 });
            }
            Err(e) if attempt < max_retries => {
                tracing::warn!(
                    model = %request.model,
                    attempt = attempt + 1,
                    error = %e,
                    "model answer failed schema validation, retrying"
                );
                last_error = Some(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Only reachable when the final attempt consumed `continue` above,
    // which cannot happen; kept for totality.
    Err(last_error.unwrap_or_else(|| AiError::Network("no attempts made".into())))
}
