//! Transport abstraction layer for Questboard.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the server and
//! the client are written against, plus a WebSocket implementation.
//!
//! A connection carries opaque binary frames; the protocol crate gives
//! them meaning. Besides data, a connection reports transport-level pongs
//! as [`Inbound::Pong`] so the server's liveness sweep can count them.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    ClientWebSocket, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PATH,
    PendingWebSocket, WebSocketConnection, WebSocketTransport, connect,
};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One thing received from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A binary (or text) frame carrying a protocol message.
    Data(Vec<u8>),
    /// The peer answered a [`Connection::ping`].
    Pong,
}

/// Accepts new incoming connections.
///
/// Accepting is split in two. [`accept`](Self::accept) only takes the peer
/// off the listener; [`PendingConnection::upgrade`] runs the handshake and
/// belongs in the peer's own task, so a peer that never finishes its
/// handshake cannot hold up the accept loop.
///
/// The methods return `Send` futures so that code generic over a transport
/// can be handed to `tokio::spawn`.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// A peer taken off the listener, not yet upgraded.
    type Pending: PendingConnection<
            Connection = Self::Connection,
            Error = Self::Error,
        >;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for the next incoming peer.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Pending, Self::Error>> + Send;

    /// Gracefully shuts down the transport, stopping new connections.
    fn shutdown(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// An accepted peer whose handshake has not run yet.
pub trait PendingConnection: Send + 'static {
    /// The connection type the handshake produces.
    type Connection: Connection;
    /// The error type for a failed or timed-out handshake.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs the handshake.
    fn upgrade(
        self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive binary frames.
///
/// All methods take `&self`, so one task can wait in [`recv`](Self::recv)
/// while another sends on the same connection.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one binary frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame or pong from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Inbound>, Self::Error>> + Send;

    /// Sends a transport-level ping. The answer shows up in
    /// [`recv`](Self::recv) as [`Inbound::Pong`].
    fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
