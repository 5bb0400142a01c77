//! Error types for the room layer.

use questboard_protocol::{ParticipantId, RoomKey};
use questboard_transport::ConnectionId;

/// Errors that can occur during room operations.
///
/// All of them concern a single message or connection; the handler logs
/// them and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The connection sent a second `Join`.
    #[error("{0} has already joined a room")]
    AlreadyJoined(ConnectionId),

    /// The connection sent something other than `Join` before joining.
    #[error("{0} has not joined a room")]
    NotJoined(ConnectionId),

    /// A `Join` reached a room the participant is already in.
    #[error("participant {0} sent a second join")]
    UnexpectedJoin(ParticipantId),

    /// The message names a participant the room does not have.
    #[error("participant {0} is not in the room")]
    UnknownParticipant(ParticipantId),

    /// Every participant id in the room is taken.
    #[error("room {0} is full")]
    RoomFull(RoomKey),

    /// The room's actor has stopped or its channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomKey),
}
