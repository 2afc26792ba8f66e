/*!
 * Per-item retry policy.
 *
 * The policy wraps one typed oracle call. Validation and transient failures
 * are retried after a backoff delay; unclassified failures abort the item at
 * once. The operation receives the attempt number so callers can acquire a
 * rate-limit slot on every attempt, retries included.
 */

use log::{debug, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::app_config::{BackoffStrategy, RetryConfig};
use crate::errors::{ItemFailure, TranslationError};

/// Smallest delay between two attempts of one item
pub const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Bounded retry with exponential or fixed backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    strategy: BackoffStrategy,
    max_backoff: Duration,
    jitter: Duration,
}

impl RetryPolicy {
    /// Exponential backoff from `base`, no jitter. `max_attempts` is at least 1.
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            strategy: BackoffStrategy::Exponential,
            max_backoff: Duration::from_secs(30),
            jitter: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_base_ms))
            .with_strategy(config.strategy)
            .with_max_backoff(Duration::from_millis(config.max_backoff_ms))
            .with_jitter(Duration::from_millis(config.jitter_ms))
    }

    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Deterministic delay after failed attempt `attempt` (1-based), before jitter.
    ///
    /// Never below `MIN_BACKOFF`, whatever the base and cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                self.base.saturating_mul(factor)
            }
        };
        delay.min(self.max_backoff).max(MIN_BACKOFF)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if self.jitter.is_zero() {
            return delay;
        }

        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Run `op` until it succeeds, fails unclassified, or attempts run out
    pub async fn execute<T, F, Fut>(&self, index: usize, mut op: F) -> Result<T, ItemFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TranslationError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Item {} succeeded on attempt {}", index, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(ItemFailure::Unclassified { attempt, error });
            }

            if attempt >= self.max_attempts {
                return Err(ItemFailure::RetryExhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.jittered_delay(attempt);
            warn!(
                "Item {} attempt {}/{} failed ({}): {}. Retrying in {:?}",
                index,
                attempt,
                self.max_attempts,
                error.kind(),
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
