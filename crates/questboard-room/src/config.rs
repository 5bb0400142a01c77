//! Room configuration.

use questboard_protocol::ParticipantId;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Live participants allowed per room, voters and spectators together.
    ///
    /// Cannot exceed the 16 ids a 4-bit participant id can address.
    pub max_participants: usize,

    /// Capacity of each room actor's command channel. Senders wait when
    /// it is full.
    pub mailbox_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_participants: ParticipantId::MAX_PARTICIPANTS,
            mailbox_size: 64,
        }
    }
}

impl RoomConfig {
    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `max_participants` is kept within `1..=16`.
    /// - `mailbox_size` is at least 1 (tokio rejects empty channels).
    pub fn validated(mut self) -> Self {
        let limit = ParticipantId::MAX_PARTICIPANTS;
        if self.max_participants == 0 || self.max_participants > limit {
            warn!(
                requested = self.max_participants,
                limit, "max_participants out of range, clamping"
            );
            self.max_participants = self.max_participants.clamp(1, limit);
        }
        self.mailbox_size = self.mailbox_size.max(1);
        self
    }
}
