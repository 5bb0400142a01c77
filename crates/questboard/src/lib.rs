//! # Questboard
//!
//! Real-time planning poker over WebSocket.
//!
//! Participants join a room by key, pick a card each, and reveal the round
//! together. The server keeps one actor per room and relays every change
//! to the room's other participants; the client keeps a local copy of the
//! room and reconnects on its own when the link drops.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use questboard::prelude::*;
//!
//! # async fn serve() -> Result<(), QuestboardError> {
//! let server = QuestboardServer::builder()
//!     .bind("0.0.0.0:48377")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! And from the other side:
//!
//! ```rust,ignore
//! let (client, events) = Client::connect(
//!     "ws://127.0.0.1:48377/ws",
//!     RoomKey::new("R1"),
//!     LocalUser::new("Ann"),
//!     ClientConfig::default(),
//! );
//! client.choose(Choice::Number(5))?;
//! client.reveal()?;
//! ```

mod error;
mod handler;
mod heartbeat;
pub mod logger;
mod server;

pub use error::QuestboardError;
pub use server::{QuestboardServer, QuestboardServerBuilder, ServerMonitor};

/// Convenience re-exports for building servers and clients.
pub mod prelude {
    pub use crate::{
        QuestboardError, QuestboardServer, QuestboardServerBuilder,
        ServerMonitor,
    };

    pub use questboard_client::{
        Client, ClientConfig, ClientEvent, ConnectionState, LocalUser,
        RoomView,
    };
    pub use questboard_protocol::{
        Choice, ClientMessage, JoinRequest, MAX_NAME_LEN, MAX_TEXT_LEN,
        ParticipantId, ParticipantInfo, RoomKey, RoomType, ServerMessage,
        Snapshot,
    };
    pub use questboard_room::{RoomConfig, RoomInfo};
    pub use questboard_timer::{BackoffConfig, HeartbeatConfig};
}
