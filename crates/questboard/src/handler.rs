//! Per-connection handler: join, message routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the connection table for heartbeat tracking
//!   2. Wait for a `Join` and hand it to the room registry
//!   3. Loop: forward decoded messages to the room, write the room's
//!      messages back out, until the peer leaves or misses a heartbeat

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use questboard_protocol::{ClientMessage, ServerMessage};
use questboard_room::{Membership, ParticipantSender, RoomError};
use questboard_transport::{
    Connection, ConnectionId, Inbound, WebSocketConnection,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time;

use crate::QuestboardError;
use crate::server::ServerState;

/// How long a closing handshake may take before the socket is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Drop guard that unregisters the connection and takes it out of its room
/// when the handler exits.
///
/// Cleanup runs even if the handler panics. Since `Drop` is synchronous,
/// the async part runs in a fire-and-forget task.
struct ConnectionGuard {
    conn_id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            state.connections.unregister(conn_id).await;
            match state.rooms.leave(conn_id).await {
                Ok(()) | Err(RoomError::NotJoined(_)) => {}
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "leave failed");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), QuestboardError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let mut liveness = state.connections.register(Arc::clone(&conn)).await;
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();
    let mut membership: Option<Membership> = None;

    loop {
        tokio::select! {
            received = conn.recv() => {
                let inbound = match received {
                    Ok(Some(inbound)) => inbound,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                liveness.alive.store(true, Ordering::Release);
                if let Inbound::Data(data) = inbound {
                    handle_frame(
                        conn_id,
                        &data,
                        &state,
                        &outbox,
                        &mut membership,
                    )
                    .await;
                }
            }
            Some(msg) = inbox.recv() => {
                let bytes = match msg.encode() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(
                            %conn_id,
                            opcode = ?msg.opcode(),
                            error = %e,
                            "dropping unencodable message"
                        );
                        continue;
                    }
                };
                // A peer that stopped reading must not outlive its heartbeat.
                tokio::select! {
                    sent = conn.send(&bytes) => sent?,
                    _ = &mut liveness.kill => {
                        tracing::debug!(%conn_id, "dropped while sending");
                        break;
                    }
                }
            }
            _ = &mut liveness.kill => {
                let _ = time::timeout(CLOSE_TIMEOUT, conn.close()).await;
                break;
            }
        }
    }

    // _guard drops here → unregister and leave fire.
    Ok(())
}

/// Decodes one frame and routes it: `Join` to the registry, everything
/// else to the room the connection joined.
async fn handle_frame(
    conn_id: ConnectionId,
    data: &[u8],
    state: &ServerState,
    outbox: &ParticipantSender,
    membership: &mut Option<Membership>,
) {
    let msg = match ClientMessage::decode(data) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "dropping undecodable frame");
            return;
        }
    };

    match (msg, membership.as_ref()) {
        (ClientMessage::Join(request), None) => {
            let room = request.room.clone();
            let joined =
                state.rooms.join(conn_id, request, outbox.clone()).await;
            match joined {
                Ok(m) => {
                    tracing::debug!(
                        %conn_id,
                        room = %m.room,
                        participant = %m.participant,
                        "connection bound to room"
                    );
                    *membership = Some(m);
                }
                Err(e) => {
                    tracing::warn!(%conn_id, %room, error = %e, "join refused");
                }
            }
        }
        (ClientMessage::Join(_), Some(_)) => {
            tracing::debug!(%conn_id, "ignoring second join");
        }
        (msg, None) => {
            tracing::debug!(
                %conn_id,
                opcode = ?msg.opcode(),
                "dropping message sent before join"
            );
        }
        (msg, Some(m)) => {
            if let Err(e) = m.handle.send_message(m.participant, msg).await {
                tracing::debug!(%conn_id, error = %e, "room rejected message");
            }
        }
    }
}
