//! Exponential backoff with jitter around fallible async calls.
//!
//! Only failures that report themselves as transient are retried. Anything
//! else is handed back after the first attempt, untouched.

use std::fmt::Display;
use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::{error, warn};

/// Classifies an error as worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_JITTER: Duration = Duration::from_secs(2);

    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_jitter: Self::DEFAULT_JITTER,
        }
    }

    /// Policy for the paper search: 5 attempts starting at 5s.
    pub fn search() -> Self {
        Self::new(5, Duration::from_secs(5))
    }

    /// Policy for the best-effort code and star lookups: 3 attempts starting at 2s.
    pub fn lookup() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based),
    /// without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial_delay.saturating_mul(1u32 << exp)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.delay_for(attempt).saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        self.max_jitter.mul_f64(fastrand::f64())
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or
    /// `max_attempts` invocations have failed. The last error is returned as is.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                error!(%label, error = %err, "unexpected error, not retrying");
                return Err(err);
            }

            warn!(%label, attempt, max_attempts, error = %err, "connection error");
            if attempt >= max_attempts {
                error!(%label, "max retries reached, giving up");
                return Err(err);
            }

            let wait = self.backoff(attempt);
            warn!(%label, wait_secs = wait.as_secs_f64(), "retrying");
            sleep(wait).await;
        }
    }
}
