//! Bounded retry for fetch-and-extract units of work
//!
//! Every failure is retried regardless of its kind. Between attempts the
//! controller sleeps for an exponentially growing delay; a zero initial
//! delay turns the loop into back-to-back attempts.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// `initial * 2^(n-1)` before retry `n`, never more than `max`
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Retry immediately
    pub fn none() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay to wait after the `failed_attempt`-th failure (1-based)
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Every attempt failed
#[derive(Debug, Error)]
#[error("Max retries exceeded for {label} after {attempts} attempt(s): {last_error}")]
pub struct ExhaustedRetries<E>
where
    E: std::error::Error + 'static,
{
    /// What was being attempted, usually the URL
    pub label: String,
    /// Total attempts made (`max_retries + 1`)
    pub attempts: u32,
    #[source]
    pub last_error: E,
}

/// Runs `op` until it succeeds or `max_retries + 1` attempts have failed
///
/// `op` receives the 1-based attempt number. Each failure is logged with
/// the label and the remaining retry budget.
///
/// # Example
///
/// ```
/// use listing_harvest::crawler::{with_retry, Backoff};
///
/// # async fn example() {
/// let value = with_retry("https://example.com/", 3, &Backoff::none(), |attempt| async move {
///     if attempt < 3 {
///         Err(std::io::Error::new(std::io::ErrorKind::Other, "flaky"))
///     } else {
///         Ok(attempt)
///     }
/// })
/// .await
/// .unwrap();
/// assert_eq!(value, 3);
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut>(
    label: &str,
    max_retries: u32,
    backoff: &Backoff,
    mut op: F,
) -> Result<T, ExhaustedRetries<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let total_attempts = max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let retries_left = total_attempts - attempt;
        tracing::error!(
            "An error occurred while processing {} (attempt {}/{}): {}",
            label,
            attempt,
            total_attempts,
            error
        );

        if retries_left == 0 {
            return Err(ExhaustedRetries {
                label: label.to_string(),
                attempts: attempt,
                last_error: error,
            });
        }

        let delay = backoff.delay_for(attempt);
        tracing::warn!(
            "Retrying request for {}, retries left {} (backoff {:?})",
            label,
            retries_left,
            delay
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
