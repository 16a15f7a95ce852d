//! Retry logic with exponential backoff for service calls.
//!
//! The loop shape is shared by the blocking and async transports: the
//! operation is run once, plus up to `max_retries` more times while it reports
//! a transient failure. Before the retry that follows failed attempt `n`
//! (0-indexed) the caller waits `min(backoff_factor * 2^n, max_backoff)`.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::AdSdkError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Base of the exponential backoff.
    pub backoff_factor: Duration,
    /// Upper bound on any single wait.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_factor: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff_factor(mut self, delay: Duration) -> Self {
        self.backoff_factor = delay;
        self
    }

    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Wait before retrying after failed attempt `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_factor
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// What a single attempt produced.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// Final answer: success or a non-retryable error.
    Done(Result<T, AdSdkError>),
    /// Transient failure. The error is surfaced if no attempts remain.
    Retry(AdSdkError),
}

/// Result of a retried operation.
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    /// The final result (success or last error).
    pub result: Result<T, AdSdkError>,
    /// Number of attempts made (1 = first try settled it).
    pub attempts: u32,
    /// Total time spent, including backoff waits.
    pub total_duration: Duration,
}

impl<T> RetryResult<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, AdSdkError> {
        self.result
    }
}

/// Run `operation` with blocking backoff sleeps between attempts.
///
/// # Example
/// ```
/// use adstract::retry::{execute_with_retry, AttemptOutcome, RetryConfig};
/// use adstract::AdSdkError;
/// use std::time::Duration;
///
/// let config = RetryConfig::default()
///     .with_max_retries(1)
///     .with_backoff_factor(Duration::ZERO);
///
/// let result = execute_with_retry(&config, |attempt| {
///     if attempt == 0 {
///         AttemptOutcome::Retry(AdSdkError::Network("reset".into()))
///     } else {
///         AttemptOutcome::Done(Ok("ad"))
///     }
/// });
///
/// assert_eq!(result.attempts, 2);
/// assert!(result.is_success());
/// ```
pub fn execute_with_retry<T, F>(config: &RetryConfig, mut operation: F) -> RetryResult<T>
where
    F: FnMut(u32) -> AttemptOutcome<T>,
{
    let start = Instant::now();

    for attempt in 0..=config.max_retries {
        match operation(attempt) {
            AttemptOutcome::Done(result) => {
                return RetryResult {
                    result,
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
            AttemptOutcome::Retry(err) => {
                if attempt == config.max_retries {
                    return RetryResult {
                        result: Err(err),
                        attempts: attempt + 1,
                        total_duration: start.elapsed(),
                    };
                }
                let delay = config.delay(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "ad_request_retry"
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }

    unhandled_exit(start)
}

/// Async counterpart of [`execute_with_retry`]; waits with `tokio::time::sleep`.
pub async fn execute_with_retry_async<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = AttemptOutcome<T>>,
{
    let start = Instant::now();

    for attempt in 0..=config.max_retries {
        match operation(attempt).await {
            AttemptOutcome::Done(result) => {
                return RetryResult {
                    result,
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
            AttemptOutcome::Retry(err) => {
                if attempt == config.max_retries {
                    return RetryResult {
                        result: Err(err),
                        attempts: attempt + 1,
                        total_duration: start.elapsed(),
                    };
                }
                let delay = config.delay(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "ad_request_retry"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    unhandled_exit(start)
}

fn unhandled_exit<T>(start: Instant) -> RetryResult<T> {
    RetryResult {
        result: Err(AdSdkError::Sdk("unhandled retry loop exit".into())),
        attempts: 0,
        total_duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_config(retries: u32) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(retries)
            .with_backoff_factor(Duration::ZERO)
    }

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay(0), Duration::from_millis(500));
        assert_eq!(config.delay(1), Duration::from_secs(1));
        assert_eq!(config.delay(3), Duration::from_secs(4));
        assert_eq!(config.delay(4), Duration::from_secs(8));
        assert_eq!(config.delay(10), Duration::from_secs(8));
        assert_eq!(config.delay(40), Duration::from_secs(8));
    }

    #[test]
    fn first_success_takes_one_attempt() {
        let result = execute_with_retry(&instant_config(1), |_| AttemptOutcome::Done(Ok(7)));
        assert_eq!(result.attempts, 1);
        assert_eq!(result.into_result().unwrap(), 7);
    }

    #[test]
    fn retries_are_bounded() {
        let mut calls = 0;
        let result: RetryResult<()> = execute_with_retry(&instant_config(1), |_| {
            calls += 1;
            AttemptOutcome::Retry(AdSdkError::Network("down".into()))
        });
        assert_eq!(calls, 2);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.result.unwrap_err(), AdSdkError::Network("down".into()));
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let mut calls = 0;
        let result: RetryResult<()> = execute_with_retry(&instant_config(0), |_| {
            calls += 1;
            AttemptOutcome::Retry(AdSdkError::Network("down".into()))
        });
        assert_eq!(calls, 1);
        assert!(!result.is_success());
    }

    #[test]
    fn done_errors_are_not_retried() {
        let mut calls = 0;
        let result: RetryResult<()> = execute_with_retry(&instant_config(3), |_| {
            calls += 1;
            AttemptOutcome::Done(Err(AdSdkError::Validation("bad".into())))
        });
        assert_eq!(calls, 1);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn async_retry_then_success() {
        let result = execute_with_retry_async(&instant_config(1), |attempt| async move {
            if attempt == 0 {
                AttemptOutcome::Retry(AdSdkError::Network("reset".into()))
            } else {
                AttemptOutcome::Done(Ok("ok"))
            }
        })
        .await;
        assert_eq!(result.attempts, 2);
        assert_eq!(result.into_result().unwrap(), "ok");
    }
}
