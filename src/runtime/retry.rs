//! Retry of partition tasks with configurable backoff
//!
//! Every task gets a fixed attempt budget. Only errors that report themselves
//! as retryable are attempted again; the last error is handed back once the
//! budget is spent so the round can fail with it.

use super::error::TaskError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration for partition tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per task, including the first one
    pub attempts: u32,

    /// Backoff strategy
    pub backoff: BackoffStrategy,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Spread retries of sibling tasks apart
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: BackoffStrategy::default(),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: false,
            jitter_factor: 0.5,
        }
    }
}

/// Backoff strategies for retry delays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,
    /// Delay multiplied by `base` after every failed attempt
    Exponential { base: f64 },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential { base: 2.0 }
    }
}

/// A task that used up its attempt budget, or failed in a way retrying
/// cannot fix.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub error: TaskError,
}

impl RetryPolicy {
    /// No retries at all; useful in tests that expect the first error.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of
    /// attempts.
    pub async fn execute<F, Fut, T>(&self, context: &str, mut operation: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", context, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !error.is_retryable() || attempt >= self.attempts {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            error,
                        });
                    }

                    let delay = self.apply_jitter(self.calculate_delay(attempt));
                    warn!(
                        "Retrying {} (attempt {}/{}) after {:?}: {}",
                        context, attempt, self.attempts, delay, error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = match &self.backoff {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Exponential { base } => {
                let multiplier = base.powi(attempt.saturating_sub(1) as i32);
                Duration::from_secs_f64(self.initial_delay.as_secs_f64() * multiplier)
            }
        };

        base_delay.min(self.max_delay)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }

        let mut rng = rand::rng();
        let jitter_range = delay.as_secs_f64() * self.jitter_factor;
        let jitter = rng.random_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }
}
