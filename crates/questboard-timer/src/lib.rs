//! Scheduled work for Questboard.
//!
//! Everything in Questboard that happens without a message arriving is
//! driven from here:
//!
//! - [`Timer`]: a cancellable one-shot deadline. The client keeps one for
//!   the next ping and one for the pong timeout.
//! - [`Backoff`]: the delay before the next reconnect attempt.
//! - [`HeartbeatConfig`]: how often the server sweeps for dead connections.
//!
//! # Integration
//!
//! A [`Timer`] is designed to sit inside a `tokio::select!` loop next to
//! the socket. When it is not armed, [`Timer::fired`] pends forever, so
//! the branch simply never wins:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         inbound = conn.recv() => { ping_timer.arm(ping_interval); pong_timer.cancel(); }
//!         () = ping_timer.fired() => { send_ping(); pong_timer.arm(pong_timeout); }
//!         () = pong_timer.fired() => break, // dead connection
//!     }
//! }
//! ```
//!
//! Re-arming replaces the old deadline and dropping the `fired()` future
//! (because another branch won) keeps it, so there is never more than one
//! pending deadline per timer.

mod backoff;
mod heartbeat;

pub use backoff::{Backoff, BackoffConfig};
pub use heartbeat::HeartbeatConfig;

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::trace;

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A one-shot deadline that can be armed, re-armed and cancelled.
#[derive(Debug)]
pub struct Timer {
    name: &'static str,
    deadline: Option<Instant>,
}

impl Timer {
    /// Creates a disarmed timer. `name` only shows up in trace logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            deadline: None,
        }
    }

    /// Arms the timer to fire `after` from now, replacing any earlier
    /// deadline.
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
        trace!(timer = self.name, ?after, "timer armed");
    }

    /// Disarms the timer. A pending [`fired`](Self::fired) will no longer
    /// complete.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            trace!(timer = self.name, "timer cancelled");
        }
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Completes when the deadline passes, then disarms the timer.
    ///
    /// Pends forever while the timer is disarmed. Cancel-safe: dropping
    /// the future before it completes leaves the deadline in place.
    pub async fn fired(&mut self) {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            return;
        };

        time::sleep_until(deadline).await;
        self.deadline = None;
        trace!(timer = self.name, "timer fired");
    }
}
