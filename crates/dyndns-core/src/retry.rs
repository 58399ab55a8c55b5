//! Retry with exponential backoff around zone API calls.
//!
//! Transient provider errors (rate limit, 5xx, connect/timeout) are retried;
//! anything else fails at once. Delays start at the configured retry delay,
//! double each time and are capped at [`MAX_INTERVAL`].

use crate::{cfg::Config, error::UpdateError};
use dyndns_provider::ProviderError;
use std::{future::Future, time::Duration};
use tracing::{debug, error, warn};

pub const MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            initial_interval: cfg.retry_delay,
            max_interval: MAX_INTERVAL,
            multiplier: BACKOFF_MULTIPLIER,
            max_retries: cfg.max_retries,
        }
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval.min(self.max_interval),
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            remaining: self.max_retries,
        }
    }
}

/// Deterministic (jitter-free) schedule, so delays never decrease.
pub struct ExponentialBackoff {
    current_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    remaining: u32,
}

impl ExponentialBackoff {
    /// Next delay, or `None` once the retry budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next.min(self.max_interval.as_secs_f64()));
        Some(interval)
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.next_backoff()
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy gives up.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, UpdateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = policy.backoff();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => {
                error!(operation = operation_name, error = %e, "non-retryable provider error");
                return Err(UpdateError::Fatal(e));
            }
            Err(e) => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        retry_after = ?delay,
                        error = %e,
                        "transient provider error, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(operation = operation_name, attempt, error = %e, "retries exhausted");
                    return Err(UpdateError::Exhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_secs(1),
            max_interval: MAX_INTERVAL,
            multiplier: BACKOFF_MULTIPLIER,
            max_retries,
        }
    }

    #[test]
    fn schedule_doubles_and_caps() {
        let delays: Vec<u64> = policy(9).backoff().map(|d| d.as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8, 16, 32, 60, 60, 60]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn zero_retries_means_no_delay() {
        assert_eq!(policy(0).backoff().next_backoff(), None);
    }

    #[test]
    fn initial_interval_above_cap_is_clamped() {
        let mut p = policy(2);
        p.initial_interval = Duration::from_secs(600);
        assert!(p.backoff().all(|d| d == MAX_INTERVAL));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let out = retry_transient(&policy(3), "list", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(ProviderError::from_status(503, "unavailable"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s of backoff on the paused clock
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(7) && waited < Duration::from_secs(8), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_attempts() {
        let err = retry_transient(&policy(2), "list", || async {
            Err::<(), _>(ProviderError::from_status(429, "slow down"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, UpdateError::Exhausted { attempts: 3, .. }), "{err}");
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_transient(&policy(5), "commit", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::from_status(403, "forbidden")) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, UpdateError::Fatal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
