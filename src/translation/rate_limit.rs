/*!
 * Sliding-window rate limiting for oracle calls.
 *
 * The limiter keeps the instants of recent calls in a FIFO. A call is admitted
 * when fewer than `max_calls` instants fall inside the trailing `period`;
 * otherwise the caller sleeps until the oldest one ages out and checks again.
 * One limiter is shared (behind an `Arc`) by every worker of a pipeline run.
 */

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::errors::AppError;

/// Admission control capping call count within a trailing time window
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum number of calls inside one window
    max_calls: usize,

    /// Length of the trailing window
    period: Duration,

    /// Instants of admitted calls, oldest first
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_calls` per `period`
    pub fn new(max_calls: usize, period: Duration) -> Result<Self, AppError> {
        if max_calls == 0 {
            return Err(AppError::Config("rate limit max_calls must be greater than zero".into()));
        }
        if period.is_zero() {
            return Err(AppError::Config("rate limit period must be greater than zero".into()));
        }

        Ok(Self {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        })
    }

    /// Convenience constructor for a window expressed in seconds
    pub fn per_seconds(max_calls: usize, period_secs: u64) -> Result<Self, AppError> {
        Self::new(max_calls, Duration::from_secs(period_secs))
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until a call may be issued, then record it
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_admit(Instant::now()) {
                None => return,
                Some(wait) => wait,
            };

            debug!("Rate limit reached, sleeping for {:.2} seconds", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of calls recorded in the current window
    pub fn in_window(&self) -> usize {
        let mut calls = self.calls.lock();
        Self::evict(&mut calls, Instant::now(), self.period);
        calls.len()
    }

    /// Admit a call at `now`, or return how long to wait before trying again.
    ///
    /// The lock is released before the caller sleeps.
    fn try_admit(&self, now: Instant) -> Option<Duration> {
        let mut calls = self.calls.lock();
        Self::evict(&mut calls, now, self.period);

        if calls.len() < self.max_calls {
            calls.push_back(now);
            return None;
        }

        // Non-empty here since max_calls > 0
        let oldest = calls.front().copied().unwrap_or(now);
        Some(self.period.saturating_sub(now.duration_since(oldest)))
    }

    /// Drop instants that are at least one period old
    fn evict(calls: &mut VecDeque<Instant>, now: Instant, period: Duration) {
        while let Some(oldest) = calls.front() {
            if now.duration_since(*oldest) >= period {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}
