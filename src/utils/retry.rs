//! Retry with exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Determines if an error is worth retrying.
///
/// Transient conditions (timeouts, connection resets, rate limits) should
/// return true; permanent conditions (bad requests, validation failures)
/// should return false so the caller can record the failure and move on.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Backoff policy applied to embedding calls and store writes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Policy that never retries, for fail-fast runs.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Run `operation`, retrying retryable errors with doubling delay.
    ///
    /// Returns the first success, or the last error once attempts are
    /// exhausted or a non-retryable error is hit.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delay = self.initial_delay;

        for attempt in 1u32.. {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.max_attempts.max(1) || !error.is_retryable() {
                        return Err(error);
                    }

                    // Jitter avoids synchronized retries against a rate-limited API
                    sleep(delay + jitter(delay / 4)).await;
                    delay = (delay * 2).min(self.max_delay);
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(nanos % max_ms)
}
