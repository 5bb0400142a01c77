//! The client handle and its background driver.
//!
//! [`Client`] is a cheap handle for the UI. The socket itself is owned by
//! a driver task that connects, joins, keeps the heartbeat, applies what
//! the server sends to the shared [`RoomView`], and reconnects with
//! backoff when the connection is lost.

use std::io;
use std::sync::Arc;

use questboard_protocol::{
    Choice, ClientMessage, MAX_TEXT_LEN, ParticipantId, RoomKey, RoomType,
    ServerMessage, truncate_utf8,
};
use questboard_timer::{Backoff, Timer};
use questboard_transport::{Connection, Inbound, TransportError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::{ClientConfig, ClientError, Connector, LocalUser, RoomView};

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection. A reconnect may be pending.
    Disconnected,
    /// A connection is being opened, or is open and waiting for `Sync`.
    Connecting,
    /// The server has sent `Sync`; the room view is live.
    Joined,
}

/// Notifications that are not part of the room state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `poker` poked `poked` (possibly this client).
    Poked {
        poker: ParticipantId,
        poked: ParticipantId,
        text: String,
    },
}

enum Command {
    Send(ClientMessage),
    Close,
}

/// Handle to a running client.
///
/// Every action updates the local [`RoomView`] at once and is sent to the
/// server when a connection is up. Actions taken while disconnected are
/// not replayed, but the local user's name, hero, spectator flag and vote
/// are part of the `Join` sent on the next connection.
///
/// Dropping the handle stops the client.
#[derive(Debug)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    view: Arc<watch::Sender<RoomView>>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl Client {
    /// Starts a client for `room` and returns it with its event stream.
    ///
    /// Must be called inside a Tokio runtime. The first connection attempt
    /// starts immediately.
    pub fn start<C: Connector>(
        connector: C,
        room: RoomKey,
        user: LocalUser,
        config: ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let config = config.validated();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(RoomView::new(room, user));
        let view = Arc::new(view_tx);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver {
            connector,
            config,
            commands: cmd_rx,
            events: event_tx,
            view: Arc::clone(&view),
            state: state_tx,
            backoff: Backoff::new(config.backoff),
        };
        let task = tokio::spawn(driver.run());

        let client = Self {
            commands: cmd_tx,
            view,
            state: state_rx,
            task: Some(task),
        };
        (client, event_rx)
    }

    /// Starts a client that connects over WebSocket to `url`.
    #[cfg(feature = "websocket")]
    pub fn connect(
        url: impl Into<String>,
        room: RoomKey,
        user: LocalUser,
        config: ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        Self::start(crate::WebSocketConnector::new(url), room, user, config)
    }

    /// A copy of the current room view.
    pub fn view(&self) -> RoomView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified whenever the room view changes.
    pub fn subscribe(&self) -> watch::Receiver<RoomView> {
        self.view.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that is notified on every connection state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Votes. See [`LocalUser::choose`] for how repeats are handled.
    pub fn choose(&self, choice: Choice) -> Result<(), ClientError> {
        self.act(|view| view.choose(choice))
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), ClientError> {
        let name = name.into();
        self.act(|view| Some(view.rename(name)))
    }

    pub fn set_hero(&self, hero: u8) -> Result<(), ClientError> {
        self.act(|view| Some(view.set_hero(hero)))
    }

    /// Steps to the next (`dir > 0`) or previous hero.
    pub fn cycle_hero(&self, dir: i8) -> Result<(), ClientError> {
        self.act(|view| Some(view.cycle_hero(dir)))
    }

    pub fn set_spectator(&self, spectator: bool) -> Result<(), ClientError> {
        self.act(|view| Some(view.set_spectator(spectator)))
    }

    /// Reveals everyone's votes.
    pub fn reveal(&self) -> Result<(), ClientError> {
        self.act(|view| Some(view.reveal()))
    }

    /// Clears the votes and starts the next quest as `room_type`.
    pub fn new_quest(&self, room_type: RoomType) -> Result<(), ClientError> {
        self.act(|view| Some(view.new_quest(room_type)))
    }

    pub fn poke(
        &self,
        target: ParticipantId,
        text: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(ClientMessage::Poke {
            target,
            text: truncate_utf8(text.into(), MAX_TEXT_LEN),
        })
    }

    /// Closes the connection, disables reconnecting and waits for the
    /// driver to stop.
    pub async fn close(mut self) {
        let _ = self.commands.send(Command::Close);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn act(
        &self,
        f: impl FnOnce(&mut RoomView) -> Option<ClientMessage>,
    ) -> Result<(), ClientError> {
        if self.commands.is_closed() {
            return Err(ClientError::Closed);
        }
        let mut outgoing = None;
        self.view.send_if_modified(|view| {
            outgoing = f(view);
            outgoing.is_some()
        });
        match outgoing {
            Some(msg) => self.send(msg),
            None => Ok(()),
        }
    }

    fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.commands
            .send(Command::Send(msg))
            .map_err(|_| ClientError::Closed)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// How a connection ended.
enum Exit {
    Reconnect,
    Close,
}

struct Driver<C: Connector> {
    connector: C,
    config: ClientConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
    view: Arc<watch::Sender<RoomView>>,
    state: watch::Sender<ConnectionState>,
    backoff: Backoff,
}

type ConnError<C> = <<C as Connector>::Connection as Connection>::Error;

impl<C: Connector> Driver<C> {
    async fn run(mut self) {
        let room = self.view.borrow().key.clone();
        debug!(%room, "client driver started");

        loop {
            self.state.send_replace(ConnectionState::Connecting);
            let exit = match self.open().await {
                Some(Ok(conn)) => {
                    self.backoff.reset();
                    self.session(conn).await
                }
                Some(Err(e)) => {
                    warn!(%room, error = %e, "connect failed");
                    Exit::Reconnect
                }
                None => Exit::Close,
            };

            self.view.send_if_modified(|view| {
                let was = view.connected;
                view.disconnected();
                was
            });
            self.state.send_replace(ConnectionState::Disconnected);

            if matches!(exit, Exit::Close) || !self.wait_backoff().await {
                break;
            }
        }

        info!(%room, "client closed");
    }

    /// Makes one connection attempt, giving up after
    /// `config.connect_timeout`. Returns `None` if the client was closed
    /// meanwhile.
    async fn open(
        &mut self,
    ) -> Option<Result<C::Connection, TransportError>> {
        let connect =
            time::timeout(self.config.connect_timeout, self.connector.connect());
        tokio::pin!(connect);
        loop {
            tokio::select! {
                result = &mut connect => {
                    return Some(result.unwrap_or_else(|_| {
                        Err(TransportError::ConnectFailed(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "connect timed out",
                        )))
                    }));
                }
                cmd = self.commands.recv() => {
                    if !Self::offline(cmd) {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleeps until the next attempt is due. Returns `false` if the client
    /// was closed meanwhile.
    async fn wait_backoff(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return true,
                cmd = self.commands.recv() => {
                    if !Self::offline(cmd) {
                        return false;
                    }
                }
            }
        }
    }

    /// Handles a command while there is no connection to send on.
    /// Returns `false` when the client should stop.
    fn offline(cmd: Option<Command>) -> bool {
        match cmd {
            Some(Command::Send(msg)) => {
                debug!(opcode = ?msg.opcode(), "not connected, message not sent");
                true
            }
            Some(Command::Close) | None => false,
        }
    }

    /// Runs one connection from `Join` until it is lost or closed.
    async fn session(&mut self, conn: C::Connection) -> Exit {
        let conn_id = conn.id();
        let join = self.view.borrow().join_request();
        let room = join.room.clone();
        if let Err(e) = self.send(&conn, ClientMessage::Join(join)).await {
            warn!(%conn_id, error = %e, "sending join failed");
            return Exit::Reconnect;
        }
        info!(%conn_id, %room, "connected, join sent");

        let mut ping = Timer::new("ping");
        let mut pong = Timer::new("pong");
        ping.arm(self.config.ping_interval);

        loop {
            tokio::select! {
                inbound = conn.recv() => {
                    let frame = match inbound {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            info!(%conn_id, "connection closed by server");
                            return Exit::Reconnect;
                        }
                        Err(e) => {
                            warn!(%conn_id, error = %e, "receive failed");
                            return Exit::Reconnect;
                        }
                    };
                    // Any traffic proves the connection is alive.
                    ping.arm(self.config.ping_interval);
                    pong.cancel();
                    if let Inbound::Data(bytes) = frame {
                        if let Err(e) = self.handle_frame(&conn, &bytes).await {
                            warn!(%conn_id, error = %e, "send failed");
                            return Exit::Reconnect;
                        }
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(msg)) => {
                        if let Err(e) = self.send(&conn, msg).await {
                            warn!(%conn_id, error = %e, "send failed");
                            return Exit::Reconnect;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = conn.close().await;
                        return Exit::Close;
                    }
                },
                () = ping.fired() => {
                    if let Err(e) = self.send(&conn, ClientMessage::Ping).await {
                        warn!(%conn_id, error = %e, "ping failed");
                        return Exit::Reconnect;
                    }
                    pong.arm(self.config.pong_timeout);
                }
                () = pong.fired() => {
                    warn!(
                        %conn_id,
                        timeout = ?self.config.pong_timeout,
                        "no answer to ping, dropping connection"
                    );
                    let _ = conn.close().await;
                    return Exit::Reconnect;
                }
            }
        }
    }

    async fn handle_frame(
        &self,
        conn: &C::Connection,
        bytes: &[u8],
    ) -> Result<(), ConnError<C>> {
        let msg = match ServerMessage::decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, len = bytes.len(), "malformed message dropped");
                return Ok(());
            }
        };

        match msg {
            ServerMessage::Ping => {
                return self.send(conn, ClientMessage::Pong).await;
            }
            ServerMessage::Pong => {}
            ServerMessage::Poke {
                poker,
                poked,
                text,
            } => {
                let _ = self.events.send(ClientEvent::Poked {
                    poker,
                    poked,
                    text,
                });
            }
            msg => {
                let synced = matches!(msg, ServerMessage::Sync(_));
                self.view.send_if_modified(|view| view.apply(msg));
                if synced {
                    let you = self.view.borrow().you;
                    debug!(participant = ?you, "room synced");
                    self.state.send_replace(ConnectionState::Joined);
                }
            }
        }
        Ok(())
    }

    /// Encodes and sends one message. A message that cannot be encoded is
    /// logged and dropped; only transport failures are returned.
    async fn send(
        &self,
        conn: &C::Connection,
        msg: ClientMessage,
    ) -> Result<(), ConnError<C>> {
        match msg.encode() {
            Ok(bytes) => conn.send(&bytes).await,
            Err(e) => {
                warn!(opcode = ?msg.opcode(), error = %e, "message dropped");
                Ok(())
            }
        }
    }
}
