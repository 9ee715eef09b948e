use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded attempts with a fixed pause after each failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: Option<E>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Runs `operation` until it succeeds or `max_attempts` calls have failed.
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    debug!(label, attempt, error = %error, "attempt failed");
                    last_error = Some(error);
                }
            }

            if attempt < self.max_attempts && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(RetryExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }

    /// Like [`RetryPolicy::run`], but answers with `degrade()` once the
    /// attempts are used up.
    pub async fn run_or_else<T, E, F, Fut, D>(&self, label: &str, operation: F, degrade: D) -> T
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        D: FnOnce() -> T,
    {
        match self.run(label, operation).await {
            Ok(value) => value,
            Err(exhausted) => {
                let reason = exhausted
                    .last_error
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| "no attempts allowed".to_string());
                warn!(label, attempts = exhausted.attempts, %reason, "retries exhausted, degrading");
                degrade()
            }
        }
    }
}
