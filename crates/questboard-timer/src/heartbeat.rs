use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How often the server checks its connections for liveness.
///
/// Every sweep closes connections that stayed silent since the previous
/// sweep and pings the rest, so a dead peer is dropped within two
/// intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Time between sweeps. Default: 4 s.
    pub sweep_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(4),
        }
    }
}

impl HeartbeatConfig {
    /// Shortest interval accepted by [`validated`](Self::validated).
    pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

    /// Creates a config with the given sweep interval.
    pub fn with_interval(sweep_interval: Duration) -> Self {
        Self { sweep_interval }
    }

    /// Raises an interval below [`Self::MIN_SWEEP_INTERVAL`] to the minimum.
    pub fn validated(mut self) -> Self {
        if self.sweep_interval < Self::MIN_SWEEP_INTERVAL {
            warn!(
                interval = ?self.sweep_interval,
                min = ?Self::MIN_SWEEP_INTERVAL,
                "heartbeat interval too short, clamping"
            );
            self.sweep_interval = Self::MIN_SWEEP_INTERVAL;
        }
        self
    }
}
