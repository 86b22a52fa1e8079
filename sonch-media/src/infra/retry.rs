//! Bounded retry with linear backoff
//!
//! The n-th failed attempt is followed by a wait of `n * base_delay` before
//! attempt n+1. Attempts never overlap. The attempt counter and the stopping
//! condition are plain data ([`RetryState`]) so both the request wrapper and
//! the per-image load loop share one definition of "try again?".

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::{debug, error, warn};

use crate::error::MediaError;

/// How many attempts an operation gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Attempt bookkeeping for one logical operation.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    failures: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Failed attempts so far. Doubles as the retry counter.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Number of the attempt about to run (1-based).
    pub fn next_attempt(&self) -> u32 {
        self.failures + 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.policy.max_attempts
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.is_exhausted() {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.policy.delay_after(self.failures))
        }
    }
}

/// Errors that know whether repeating the request could help.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for MediaError {
    fn is_transient(&self) -> bool {
        MediaError::is_transient(self)
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// the policy's attempts are used up. The last error is returned unchanged.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut state = RetryState::new(policy);

    loop {
        let attempt = state.next_attempt();
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("[retry] {label} succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => match state.record_failure() {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        "[retry] {label} failed (attempt {attempt}/{}): {err}, retrying in {delay:?}",
                        policy.max_attempts()
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    error!(
                        "[retry] {label} failed after {attempt} attempts: {err}"
                    );
                    return Err(err);
                }
            },
        }
    }
}
