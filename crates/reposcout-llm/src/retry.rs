use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::LlmError;

/// Randomized exponential backoff for fallible provider calls.
///
/// Before retry `n` (1-based) the call sleeps for a uniformly random delay in
/// `[0, ceiling]`, where `ceiling = min_wait * 2^(n-1)` clamped to
/// `[min_wait, max_wait]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Wall-clock cap for all attempts of a single call.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(20),
            max_elapsed: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the random delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.min_wait
            .saturating_mul(factor)
            .clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }

    fn backoff_delay(&self, retry: u32) -> Duration {
        let ceiling = self.backoff_ceiling(retry).as_secs_f64();
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=ceiling))
    }
}

/// Run `f` until it succeeds, fails permanently, or the policy is exhausted.
///
/// Errors for which [`LlmError::is_retryable`] is false are returned after a
/// single attempt. Otherwise the last error is returned once `max_attempts`
/// calls have failed or the next sleep would cross `max_elapsed`.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() {
            tracing::warn!(operation, attempt, "permanent failure, not retrying: {err}");
            return Err(err);
        }
        if attempt >= max_attempts {
            tracing::warn!(operation, attempt, "giving up after {attempt} attempts: {err}");
            return Err(err);
        }

        let delay = policy.backoff_delay(attempt);
        if let Some(cap) = policy.max_elapsed
            && started.elapsed() + delay > cap
        {
            tracing::warn!(
                operation,
                attempt,
                elapsed = ?started.elapsed(),
                "retry time budget exhausted: {err}"
            );
            return Err(err);
        }

        tracing::warn!(
            operation,
            attempt,
            max_attempts,
            ?delay,
            "transient failure, retrying: {err}"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
