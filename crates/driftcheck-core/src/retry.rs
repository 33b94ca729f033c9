//! Bounded retry for eventual-consistency lag.
//!
//! Right after an apply the store may briefly report stale listings or
//! throttle requests. [`Retrier`] re-runs a boolean check a fixed number of
//! times with a fixed (or linearly growing) delay between attempts. Only
//! mismatches and errors accepted by the `retry_if` predicate are retried.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Backoff {
    /// Wait the same delay before every retry.
    #[default]
    Fixed,
    /// Wait `delay * n` before retry `n`.
    Linear,
}

/// Retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    /// Delay growth.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// A fixed-delay policy.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// A linearly growing delay policy.
    #[must_use]
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Linear,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt),
        }
    }
}

/// Result of [`Retrier::retry_until`].
#[derive(Debug)]
pub struct RetryOutcome<E> {
    /// Whether the check eventually returned `true`.
    pub satisfied: bool,
    /// How many times the check ran.
    pub attempts: u32,
    /// The error from the last attempt, if it failed with one.
    pub last_error: Option<E>,
}

impl<E> RetryOutcome<E> {
    /// Convert into the `(bool, error)` pair of the last attempt.
    pub fn into_pair(self) -> (bool, Option<E>) {
        (self.satisfied, self.last_error)
    }
}

type RetryIf<'a, E> = Box<dyn Fn(&E) -> bool + Send + Sync + 'a>;
type OnRetry<'a> = Box<dyn Fn(u32, u32) + Send + Sync + 'a>;

/// Bounded retrier for boolean checks.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use driftcheck_core::retry::{Retrier, RetryPolicy};
///
/// let runtime = tokio::runtime::Builder::new_current_thread()
///     .enable_time()
///     .build()
///     .unwrap();
/// let mut calls = 0;
/// let outcome = runtime.block_on(
///     Retrier::<std::io::Error>::new(RetryPolicy::fixed(3, Duration::ZERO)).retry_until(|| {
///         calls += 1;
///         let done = calls == 2;
///         async move { Ok(done) }
///     }),
/// );
/// assert!(outcome.satisfied);
/// assert_eq!(outcome.attempts, 2);
/// ```
pub struct Retrier<'a, E> {
    policy: RetryPolicy,
    retry_if: Option<RetryIf<'a, E>>,
    on_retry: Option<OnRetry<'a>>,
}

impl<E> fmt::Debug for Retrier<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .field("retry_if", &self.retry_if.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a, E> Retrier<'a, E> {
    /// Create a retrier. Without a `retry_if` predicate every error stops
    /// the loop immediately.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry_if: None,
            on_retry: None,
        }
    }

    /// Retry errors for which `predicate` returns `true`.
    #[must_use]
    pub fn retry_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'a) -> Self {
        self.retry_if = Some(Box::new(predicate));
        self
    }

    /// Called with `(next_attempt, max_attempts)` before every retry.
    #[must_use]
    pub fn on_retry(mut self, hook: impl Fn(u32, u32) + Send + Sync + 'a) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }

    /// The configured policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `check` until it returns `Ok(true)`, a non-retryable error, or
    /// the attempt budget is spent.
    ///
    /// `Ok(false)` is treated as lag and retried. On exhaustion the last
    /// `(false, error)` pair is returned; the caller is expected to assert on
    /// it so the failure carries full diagnostics.
    pub async fn retry_until<F, Fut>(&self, mut check: F) -> RetryOutcome<E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let max = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_error = match check().await {
                Ok(true) => {
                    return RetryOutcome {
                        satisfied: true,
                        attempts: attempt,
                        last_error: None,
                    };
                }
                Ok(false) => None,
                Err(e) => {
                    let retryable = self.retry_if.as_ref().is_some_and(|pred| pred(&e));
                    if !retryable {
                        return RetryOutcome {
                            satisfied: false,
                            attempts: attempt,
                            last_error: Some(e),
                        };
                    }
                    Some(e)
                }
            };

            if attempt >= max {
                return RetryOutcome {
                    satisfied: false,
                    attempts: attempt,
                    last_error,
                };
            }

            let next = attempt + 1;
            warn!(
                attempt = next,
                max_attempts = max,
                "(#{next}/{max}) retrying for eventual consistency"
            );
            if let Some(hook) = &self.on_retry {
                hook(next, max);
            }
            tokio::time::sleep(self.policy.delay_after(attempt)).await;
        }
    }
}
