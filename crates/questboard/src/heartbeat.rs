//! Liveness tracking for server connections.
//!
//! Every connection has an `alive` flag that its handler raises whenever
//! anything arrives. A periodic sweep closes the connections whose flag is
//! still down since the previous sweep, then lowers the flag of the rest
//! and pings them. A healthy peer answers the ping (tungstenite does this
//! on its own), which raises the flag again before the next sweep.
//!
//! Pings run in their own tasks and give up after one interval, so a peer
//! that stopped reading cannot stall the sweep for everyone else.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use questboard_timer::HeartbeatConfig;
use questboard_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

struct Entry {
    conn: Arc<WebSocketConnection>,
    alive: Arc<AtomicBool>,
    kill: Option<oneshot::Sender<()>>,
}

/// What a handler gets back when it registers its connection.
pub(crate) struct Liveness {
    /// Raise on every inbound frame.
    pub(crate) alive: Arc<AtomicBool>,
    /// Completes when the connection must be closed.
    pub(crate) kill: oneshot::Receiver<()>,
}

/// All open connections, keyed by id.
#[derive(Default)]
pub(crate) struct ConnectionTable {
    entries: Mutex<HashMap<ConnectionId, Entry>>,
}

impl ConnectionTable {
    pub(crate) async fn register(
        &self,
        conn: Arc<WebSocketConnection>,
    ) -> Liveness {
        let alive = Arc::new(AtomicBool::new(true));
        let (kill_tx, kill_rx) = oneshot::channel();
        let entry = Entry {
            conn: Arc::clone(&conn),
            alive: Arc::clone(&alive),
            kill: Some(kill_tx),
        };
        self.entries.lock().await.insert(conn.id(), entry);
        Liveness {
            alive,
            kill: kill_rx,
        }
    }

    pub(crate) async fn unregister(&self, id: ConnectionId) {
        self.entries.lock().await.remove(&id);
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Closes silent connections and pings the others. A ping still
    /// pending after `ping_timeout` is abandoned.
    pub(crate) async fn sweep(&self, ping_timeout: Duration) {
        let mut dead = Vec::new();
        let mut live = Vec::new();
        {
            let mut entries = self.entries.lock().await;
            entries.retain(|id, entry| {
                if entry.alive.swap(false, Ordering::AcqRel) {
                    live.push(Arc::clone(&entry.conn));
                    true
                } else {
                    dead.push((*id, entry.kill.take()));
                    false
                }
            });
        }

        for (id, kill) in dead {
            tracing::info!(conn_id = %id, "heartbeat missed, dropping connection");
            if let Some(kill) = kill {
                let _ = kill.send(());
            }
        }
        for conn in live {
            tokio::spawn(async move {
                match time::timeout(ping_timeout, conn.ping()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(conn_id = %conn.id(), error = %e, "ping failed");
                    }
                    Err(_) => {
                        tracing::debug!(conn_id = %conn.id(), "ping timed out");
                    }
                }
            });
        }
    }

    /// Tells every handler to close its connection.
    pub(crate) async fn close_all(&self) {
        let mut entries = self.entries.lock().await;
        for (_, mut entry) in entries.drain() {
            if let Some(kill) = entry.kill.take() {
                let _ = kill.send(());
            }
        }
    }
}

/// Runs [`ConnectionTable::sweep`] every `config.sweep_interval`.
///
/// The first sweep happens one interval after the call, so a connection
/// is never dropped before it had a full interval to answer.
pub(crate) fn spawn_sweeper(
    table: Arc<ConnectionTable>,
    config: HeartbeatConfig,
) -> JoinHandle<()> {
    let interval = config.validated().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            table.sweep(interval).await;
        }
    })
}
