//! Room registry and broadcaster for Questboard.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! room's state and the outbound channels of its participants.
//!
//! # Key types
//!
//! - [`Room`]: the voting state and the rules for changing it
//! - [`RoomRegistry`]: creates rooms on first join, destroys them when empty
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: room settings (capacity, mailbox size)

mod config;
mod error;
mod manager;
mod room;
mod state;

pub use config::RoomConfig;
pub use error::RoomError;
pub use manager::{Membership, RoomRegistry};
pub use room::{ParticipantSender, RoomHandle};
pub use state::{Dispatch, Participant, Recipient, Room, RoomInfo};
