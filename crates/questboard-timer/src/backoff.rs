//! Reconnect backoff.
//!
//! The delay grows with the base-10 logarithm of the attempt count, so the
//! first retry is immediate, the tenth waits one `step`, the hundredth two.
//! It is capped, then a uniform random jitter is added so that a room full
//! of clients dropped by the same outage does not reconnect in lockstep.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Tuning for [`Backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay added per power of ten of attempts. Default: 1200 ms.
    pub step: Duration,
    /// Upper bound on the delay before jitter. Default: 5000 ms.
    pub cap: Duration,
    /// Largest random extra delay. Default: 1000 ms.
    pub max_jitter: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(1200),
            cap: Duration::from_millis(5000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl BackoffConfig {
    /// Fixes values that would make the backoff misbehave.
    ///
    /// A `step` larger than `cap` is lowered to `cap`.
    pub fn validated(mut self) -> Self {
        if self.step > self.cap {
            warn!(
                step = ?self.step,
                cap = ?self.cap,
                "backoff step exceeds cap, clamping"
            );
            self.step = self.cap;
        }
        self
    }

    /// The delay before jitter for the given 1-based attempt number.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let millis = self.step.as_millis() as f64 * f64::from(attempt).log10();
        Duration::from_millis(millis.round() as u64).min(self.cap)
    }
}

/// Counts reconnect attempts and hands out the delay before each one.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
}

impl Backoff {
    /// Creates a backoff with no attempts recorded.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config: config.validated(),
            attempts: 0,
        }
    }

    /// Records one more attempt and returns how long to wait before it.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        let base = self.config.base_delay(self.attempts);
        let delay = base + self.jitter();
        debug!(attempt = self.attempts, ?delay, "reconnect scheduled");
        delay
    }

    /// Forgets previous attempts. Called once a connection opens.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts recorded since the last [`reset`](Self::reset).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    fn jitter(&self) -> Duration {
        let max = u64::try_from(self.config.max_jitter.as_micros())
            .unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::rng().random_range(0..max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
