use std::future::Future;
use std::time::Duration;

use crate::LensError;

/// Errors worth another attempt. Schema violations are retryable because
/// the generator may produce a conforming value on a fresh sample;
/// cancellation and serde failures are not.
pub fn is_retryable(error: &LensError) -> bool {
    matches!(
        error,
        LensError::GenerationUnavailable(_)
            | LensError::SchemaViolation { .. }
            | LensError::ToolCallFailed { .. }
            | LensError::Timeout(_)
    )
}

/// Uniform retry/timeout discipline: up to `max_attempts` attempts, each
/// bounded by `per_call_timeout`, with exponential backoff between
/// attempts. Applied by both the intent parser and the data-fetch
/// executor so the semantics are tested once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub per_call_timeout: Duration,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_call_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, per_call_timeout: Duration, backoff_base: Duration) -> Self {
        Self {
            max_attempts,
            per_call_timeout,
            backoff_base,
        }
    }

    fn backoff_for(&self, attempt: usize) -> Duration {
        // attempt is 1-based; first retry waits the base delay.
        self.backoff_base
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16) as u32)
    }

    /// Run `operation` under this policy. Non-retryable errors return
    /// immediately; retryable errors are retried until the attempt budget
    /// is spent, after which the last error is returned unchanged so the
    /// caller can distinguish a final timeout from a final failure.
    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, LensError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LensError>>,
    {
        if self.max_attempts == 0 {
            return Err(LensError::MaxAttemptsExceeded { max: 0 });
        }

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let outcome = match tokio::time::timeout(self.per_call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(LensError::Timeout(self.per_call_timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !is_retryable(&error) {
                        return Err(error);
                    }
                    if attempt < self.max_attempts {
                        let delay = self.backoff_for(attempt);
                        tracing::warn!(
                            %label,
                            attempt,
                            max_attempts = self.max_attempts,
                            %error,
                            "attempt failed, backing off {delay:?}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or(LensError::MaxAttemptsExceeded {
            max: self.max_attempts,
        }))
    }
}
