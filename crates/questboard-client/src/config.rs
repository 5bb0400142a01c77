//! Client configuration.

use std::time::Duration;

use questboard_timer::BackoffConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Heartbeat and reconnect tuning for a [`Client`](crate::Client).
///
/// The intervals are tunables, not part of the protocol: a server never
/// depends on how often a client pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Quiet time after the last inbound message before a `Ping` is sent.
    /// Default: 2 s.
    pub ping_interval: Duration,

    /// How long to wait for any inbound message after a `Ping` before the
    /// connection is considered dead. Default: 2 s.
    pub pong_timeout: Duration,

    /// How long one connection attempt may take, handshake included,
    /// before it counts as failed. Default: 5 s.
    pub connect_timeout: Duration,

    /// Delay between reconnect attempts.
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(2),
            pong_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Shortest accepted heartbeat interval or timeout.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Raises intervals below [`Self::MIN_INTERVAL`] so that a zero value
    /// cannot turn the heartbeat into a busy loop.
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("ping_interval", &mut self.ping_interval),
            ("pong_timeout", &mut self.pong_timeout),
            ("connect_timeout", &mut self.connect_timeout),
        ] {
            if *value < Self::MIN_INTERVAL {
                warn!(
                    setting = name,
                    requested = ?value,
                    min = ?Self::MIN_INTERVAL,
                    "heartbeat setting too short, clamping"
                );
                *value = Self::MIN_INTERVAL;
            }
        }
        self.backoff = self.backoff.validated();
        self
    }
}
