//! Bounded polling to confirm that an issued action became visible.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::QueryError;

/// Fixed-delay retry budget for convergence confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of fetches, including the first one.
    pub max_attempts: u32,
    /// Sleep between two fetches.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    /// 20 attempts, one second apart.
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(1),
        }
    }
}

/// Last observed state of a confirmation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence<O> {
    pub observed: O,
    pub attempts: u32,
    /// False when the budget ran out before the predicate held.
    pub converged: bool,
}

/// Poll `fetch_observed` until `predicate` holds or the budget runs out.
///
/// Exhausting the budget is not an error: the last observation is returned
/// with `converged = false`. A failing fetch aborts immediately.
pub async fn confirm_convergence<O, F, Fut, P>(
    mut fetch_observed: F,
    predicate: P,
    policy: &RetryPolicy,
) -> Result<Convergence<O>, QueryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<O, QueryError>>,
    P: Fn(&O) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let observed = fetch_observed().await?;

        if predicate(&observed) {
            debug!(attempt, "Converged");
            return Ok(Convergence {
                observed,
                attempts: attempt,
                converged: true,
            });
        }

        if attempt >= max_attempts {
            warn!(
                attempts = attempt,
                "State did not converge, continuing with last observation"
            );
            return Ok(Convergence {
                observed,
                attempts: attempt,
                converged: false,
            });
        }

        debug!(attempt, delay_ms = policy.delay.as_millis() as u64, "Not converged yet");
        sleep(policy.delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 20);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn converges_on_last_attempt() {
        let policy = RetryPolicy::default();
        let fetches = Cell::new(0u32);
        let start = Instant::now();

        let result = confirm_convergence(
            || {
                fetches.set(fetches.get() + 1);
                let n = fetches.get();
                async move { Ok(n) }
            },
            |n: &u32| *n == policy.max_attempts,
            &policy,
        )
        .await
        .unwrap();

        assert!(result.converged);
        assert_eq!(result.attempts, 20);
        assert_eq!(fetches.get(), 20);
        // 19 one-second sleeps on the virtual clock
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(19) && elapsed < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_observation() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let fetches = Cell::new(0u32);
        let start = Instant::now();

        let result = confirm_convergence(
            || {
                fetches.set(fetches.get() + 1);
                let n = fetches.get();
                async move { Ok(n) }
            },
            |_| false,
            &policy,
        )
        .await
        .unwrap();

        assert!(!result.converged);
        assert_eq!(result.observed, 5);
        assert_eq!(fetches.get(), 5);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_match_does_not_sleep() {
        let policy = RetryPolicy::default();
        let start = Instant::now();

        let result = confirm_convergence(|| async { Ok(1) }, |s: &i32| *s == 1, &policy)
            .await
            .unwrap();

        assert!(result.converged);
        assert_eq!(result.attempts, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let fetches = Cell::new(0u32);

        let err = confirm_convergence(
            || {
                fetches.set(fetches.get() + 1);
                async { Err::<u32, _>(QueryError::new(vec!["ps".into()], 1, "timeout")) }
            },
            |_| true,
            &policy,
        )
        .await
        .unwrap_err();

        assert_eq!(err.stderr, "timeout");
        assert_eq!(fetches.get(), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_fetches_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);

        let result = confirm_convergence(|| async { Ok(0u32) }, |_| false, &policy)
            .await
            .unwrap();

        assert_eq!(result.attempts, 1);
        assert!(!result.converged);
    }
}
