//! Wire protocol for Questboard.
//!
//! This crate defines the bytes that clients and the server exchange:
//!
//! - **Codec** ([`BitWriter`], [`BitReader`]): a symmetric bit-level
//!   packer. Fields take exactly as many bits as the schema gives them.
//! - **Types** ([`Choice`], [`ParticipantId`], [`RoomKey`], [`RoomType`]):
//!   the values messages are built from.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): the fixed
//!   catalogue of opcodes and their payload layouts.
//! - **Errors** ([`ProtocolError`]): what can go wrong while packing or
//!   unpacking.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or rooms. It turns a
//! message into a `Vec<u8>` and back:
//!
//! ```text
//! Transport (binary frames) → Protocol (ClientMessage / ServerMessage) → Room
//! ```
//!
//! # Example
//!
//! ```
//! use questboard_protocol::{Choice, ClientMessage};
//!
//! let bytes = ClientMessage::UpdateChoice(Choice::Number(5)).encode()?;
//! assert_eq!(bytes, vec![0b0000_0011, 5]);
//!
//! let decoded = ClientMessage::decode(&bytes)?;
//! assert_eq!(decoded, ClientMessage::UpdateChoice(Choice::Number(5)));
//! # Ok::<(), questboard_protocol::ProtocolError>(())
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

pub mod codec;
mod error;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{BitReader, BitWriter, MAX_MESSAGE_SIZE};
pub use error::ProtocolError;
pub use message::{
    COUNT_BITS, ClientMessage, JoinRequest, OPCODE_BITS, Opcode,
    ParticipantInfo, ServerMessage, Snapshot,
};
pub use types::{
    Choice, ChoiceTag, MAX_NAME_LEN, MAX_TEXT_LEN, ParticipantId, RoomKey,
    RoomType, truncate_utf8,
};
