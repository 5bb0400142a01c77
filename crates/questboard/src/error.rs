//! Unified error type for Questboard.

use questboard_client::ClientError;
use questboard_protocol::ProtocolError;
use questboard_room::RoomError;
use questboard_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuestboardError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room refused an operation.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The client handle is closed.
    #[error(transparent)]
    Client(#[from] ClientError),
}
