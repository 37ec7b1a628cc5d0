//! Bounded retry with exponential backoff.
//!
//! Both network clients (the listing fetcher and the webhook sender) run their
//! requests through [`with_backoff`]. The operation decides nothing about
//! retrying itself; instead its error type implements [`Retryable`] and tells
//! the loop whether another attempt makes sense and how long to wait.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter_ms)
//! ```
//!
//! A server-provided cooldown ([`RetryHint::After`]) replaces the computed
//! delay but is still capped at `max_delay`, so a single cycle never stalls
//! for long.

use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

/// What the retry loop should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    /// Permanent failure; return the error immediately.
    Stop,
    /// Transient failure; wait the policy's backoff delay.
    Backoff,
    /// Transient failure with an explicit cooldown from the remote side.
    After(Duration),
}

/// Classifies an error for [`with_backoff`].
pub trait Retryable {
    fn retry_hint(&self) -> RetryHint;
}

/// Attempt budget and delay shape for [`with_backoff`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Delay after the first failure; doubles on each further failure.
    pub base_delay: Duration,
    /// Upper bound for both computed and server-provided delays.
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to computed delays.
    pub jitter_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter_ms: 250,
        }
    }

    pub fn with_jitter_ms(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    /// Delay before the attempt following failure number `attempt` (1-based).
    fn delay_for(&self, attempt: usize, hint: RetryHint) -> Duration {
        match hint {
            RetryHint::After(cooldown) => cooldown.min(self.max_delay),
            _ => {
                let shift = (attempt.saturating_sub(1)).min(16) as u32;
                let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
                if self.jitter_ms == 0 {
                    delay
                } else {
                    let jitter: u64 = rng().random_range(0..=self.jitter_ms);
                    delay + Duration::from_millis(jitter)
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Run `op` until it succeeds, returns a [`RetryHint::Stop`] error, or the
/// attempt budget is spent. `op` receives the 1-based attempt number.
///
/// The last error is returned unchanged so callers can wrap it in their own
/// error kind.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        attempt += 1;
        let attempt_t0 = Instant::now();
        let e = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let hint = e.retry_hint();
        let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
        let elapsed_ms_total = total_t0.elapsed().as_millis();

        if hint == RetryHint::Stop {
            warn!(label, attempt, elapsed_ms_attempt, error = %e, "permanent failure; not retrying");
            return Err(e);
        }

        if attempt >= policy.max_attempts {
            error!(
                label,
                attempt,
                max = policy.max_attempts,
                elapsed_ms_attempt,
                elapsed_ms_total,
                error = %e,
                "retries exhausted"
            );
            return Err(e);
        }

        let delay = policy.delay_for(attempt, hint);
        warn!(
            label,
            attempt,
            max = policy.max_attempts,
            elapsed_ms_attempt,
            elapsed_ms_total,
            ?delay,
            error = %e,
            "attempt failed; backing off"
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestError(RetryHint);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error ({:?})", self.0)
        }
    }

    impl Retryable for TestError {
        fn retry_hint(&self) -> RetryHint {
            self.0
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO).with_jitter_ms(0)
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let res: Result<(), TestError> = with_backoff(&fast_policy(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError(RetryHint::Backoff)) }
        })
        .await;

        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stop_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let res: Result<(), TestError> = with_backoff(&fast_policy(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError(RetryHint::Stop)) }
        })
        .await;

        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failure() {
        let res: Result<usize, TestError> = with_backoff(&fast_policy(), "test", |attempt| async move {
            if attempt == 1 {
                Err(TestError(RetryHint::After(Duration::ZERO)))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(res.unwrap(), 2);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter_ms: 0,
        };
        assert_eq!(policy.delay_for(1, RetryHint::Backoff), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, RetryHint::Backoff), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, RetryHint::Backoff), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4, RetryHint::Backoff), Duration::from_secs(5));
    }

    #[test]
    fn test_server_cooldown_is_capped() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1)).with_jitter_ms(0);
        assert_eq!(
            policy.delay_for(1, RetryHint::After(Duration::from_millis(1500))),
            Duration::from_millis(1500)
        );
        assert_eq!(
            policy.delay_for(1, RetryHint::After(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100)).with_jitter_ms(50);
        for _ in 0..20 {
            let d = policy.delay_for(1, RetryHint::Backoff);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }
}
