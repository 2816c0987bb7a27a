//! Retry with exponential backoff for network-facing git operations.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Something that can wait. Real runs block the thread; tests record.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A failed retry loop: the last error and how many attempts were made.
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub error: E,
}

/// Attempts with doubling delay: 2s, 4s, 8s, ... between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    pub fn run<T, E, F>(&self, label: &str, sleeper: &dyn Sleeper, op: F) -> Result<T, RetryFailure<E>>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_while(label, sleeper, op, |_| true)
    }

    /// Like [`run`](Self::run), but stops early when `retryable` says the
    /// error is not worth another attempt.
    pub fn run_while<T, E, F, R>(
        &self,
        label: &str,
        sleeper: &dyn Sleeper,
        mut op: F,
        retryable: R,
    ) -> Result<T, RetryFailure<E>>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt >= self.max_attempts || !retryable(&error) {
                        return Err(RetryFailure { attempts: attempt, error });
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "attempt failed, backing off"
                    );
                    sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::from_secs(cfg.initial_delay_secs))
    }
}
