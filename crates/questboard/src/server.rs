//! `QuestboardServer` builder and server loop.
//!
//! This is the entry point for running a Questboard server. It ties the
//! layers together: transport → protocol → room registry, with the
//! heartbeat sweep running alongside.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use questboard_protocol::RoomKey;
use questboard_room::{RoomConfig, RoomInfo, RoomRegistry};
use questboard_timer::HeartbeatConfig;
use questboard_transport::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PATH, PendingConnection, Transport,
    TransportError, WebSocketTransport,
};
use tokio::task::JoinHandle;

use crate::QuestboardError;
use crate::handler::handle_connection;
use crate::heartbeat::{ConnectionTable, spawn_sweeper};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    /// Join and leave go through the registry. Routine messages bypass it.
    pub(crate) rooms: RoomRegistry,
    pub(crate) connections: Arc<ConnectionTable>,
}

/// Builder for configuring and starting a Questboard server.
///
/// # Example
///
/// ```rust,ignore
/// use questboard::prelude::*;
///
/// let server = QuestboardServer::builder()
///     .bind("0.0.0.0:48377")
///     .heartbeat(HeartbeatConfig::with_interval(Duration::from_secs(4)))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct QuestboardServerBuilder {
    bind_addr: String,
    path: String,
    handshake_timeout: Duration,
    room_config: RoomConfig,
    heartbeat: HeartbeatConfig,
}

impl QuestboardServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:48377".to_string(),
            path: DEFAULT_PATH.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            room_config: RoomConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the HTTP path WebSocket upgrades are accepted on.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets how long a new socket may take to send its upgrade request.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn heartbeat(mut self, config: HeartbeatConfig) -> Self {
        self.heartbeat = config;
        self
    }

    /// Binds the listener. The server does not accept connections until
    /// [`QuestboardServer::run`] is called.
    pub async fn build(self) -> Result<QuestboardServer, QuestboardError> {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_path(self.path)
            .with_handshake_timeout(self.handshake_timeout);

        let state = Arc::new(ServerState {
            rooms: RoomRegistry::new(self.room_config),
            connections: Arc::new(ConnectionTable::default()),
        });

        Ok(QuestboardServer {
            transport,
            state,
            heartbeat: self.heartbeat.validated(),
        })
    }
}

impl Default for QuestboardServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Questboard server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuestboardServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
    heartbeat: HeartbeatConfig,
}

impl QuestboardServer {
    /// Creates a new builder.
    pub fn builder() -> QuestboardServerBuilder {
        QuestboardServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, QuestboardError> {
        Ok(self.transport.local_addr()?)
    }

    /// A read-only view of the server's rooms and connections that stays
    /// valid while the server runs.
    pub fn monitor(&self) -> ServerMonitor {
        ServerMonitor {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), QuestboardError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then closes every
    /// connection and stops every room.
    ///
    /// Each accepted socket is upgraded and served in its own task.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), QuestboardError> {
        let addr = self.transport.local_addr()?;
        tracing::info!(%addr, "questboard server running");

        let _sweeper = AbortOnDrop(spawn_sweeper(
            Arc::clone(&self.state.connections),
            self.heartbeat,
        ));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let conn = match pending.upgrade().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(error = %e, "upgrade failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        self.state.connections.close_all().await;
        self.state.rooms.shutdown().await;
        tracing::info!("questboard server stopped");
        Ok(())
    }
}

/// Aborts the task when dropped, so it cannot outlive the server loop.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Read-only access to a running server, for operators and tests.
#[derive(Clone)]
pub struct ServerMonitor {
    state: Arc<ServerState>,
}

impl ServerMonitor {
    pub async fn room_count(&self) -> usize {
        self.state.rooms.room_count().await
    }

    pub async fn room_keys(&self) -> Vec<RoomKey> {
        self.state.rooms.room_keys().await
    }

    pub async fn room_info(&self, key: &RoomKey) -> Option<RoomInfo> {
        self.state.rooms.room_info(key).await
    }

    /// Open connections, joined or not.
    pub async fn connection_count(&self) -> usize {
        self.state.connections.len().await
    }
}
