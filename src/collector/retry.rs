//! Retry-with-backoff around whole collection cycles.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::traits::CollectorError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry; doubled after every failure.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Bounded exponential backoff without jitter or cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

/// The final failure of a retried operation.
#[derive(Debug, Error)]
#[error("operation failed after {attempts} attempt(s): {source}")]
pub struct RetryError {
    /// Number of times the operation ran.
    pub attempts: u32,
    pub source: CollectorError,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Run `operation` until it succeeds, at most `max_retries + 1` times.
    ///
    /// The closure receives the 0-indexed attempt number. Errors for which
    /// [`CollectorError::is_retryable`] is false end the loop at once, and the
    /// backoff sleep returns early with `Cancelled` when `cancel` fires.
    pub async fn run<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CollectorError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0;

        loop {
            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;

            if !err.is_retryable() || attempt > self.max_retries {
                return Err(RetryError {
                    attempts: attempt,
                    source: err,
                });
            }

            warn!(
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after failed attempt"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(RetryError {
                        attempts: attempt,
                        source: CollectorError::Cancelled,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = delay.saturating_mul(2);
        }
    }
}
