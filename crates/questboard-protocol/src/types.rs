//! Value types that travel on the wire.
//!
//! These are the small building blocks the message catalogue is made of:
//! participant ids, room keys, the room type flag, and the [`Choice`] a
//! participant votes with.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{BitReader, BitWriter};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Text limits
// ---------------------------------------------------------------------------

/// Longest participant name, in bytes, a room stores and relays.
pub const MAX_NAME_LEN: usize = 64;

/// Longest free-text vote or poke message, in bytes, a room stores and
/// relays.
///
/// With [`MAX_NAME_LEN`] this keeps a full 16-participant `Sync` under
/// [`MAX_MESSAGE_SIZE`](crate::MAX_MESSAGE_SIZE).
pub const MAX_TEXT_LEN: usize = 48;

/// Cuts `text` down to at most `max` bytes, on a UTF-8 character boundary.
pub fn truncate_utf8(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a participant within one room.
///
/// Ids are assigned by the server at join time and are only unique inside
/// their room. On the wire they are 4 bits wide, which caps a room at
/// [`ParticipantId::MAX_PARTICIPANTS`] live participants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u8);

impl ParticipantId {
    /// Width of a participant id field.
    pub const BITS: u32 = 4;

    /// Number of distinct ids the 4-bit field can carry.
    pub const MAX_PARTICIPANTS: usize = 1 << Self::BITS;

    pub(crate) fn write(
        self,
        w: &mut BitWriter,
    ) -> Result<(), ProtocolError> {
        if usize::from(self.0) >= Self::MAX_PARTICIPANTS {
            return Err(ProtocolError::ValueOutOfRange {
                field: "participant id",
                value: u64::from(self.0),
                bits: Self::BITS,
            });
        }
        w.write_bits(Self::BITS, u32::from(self.0))
    }

    pub(crate) fn read(r: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        // A 4-bit read always fits in a u8.
        Ok(Self(r.read_bits(Self::BITS)? as u8))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The opaque string key a room is addressed by.
///
/// Keys longer than [`RoomKey::MAX_LEN`] bytes are cut down to fit, always
/// on a UTF-8 character boundary, so the same URL segment maps to the same
/// room no matter which side truncated it.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    /// Longest key, in bytes, that is kept intact.
    pub const MAX_LEN: usize = 18;

    /// Creates a key, truncating it to [`Self::MAX_LEN`] bytes.
    pub fn new(key: impl Into<String>) -> Self {
        Self(truncate_utf8(key.into(), Self::MAX_LEN))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

// ---------------------------------------------------------------------------
// RoomType
// ---------------------------------------------------------------------------

/// What the room is estimating. Sent as a single bit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum RoomType {
    /// Relative story points.
    #[default]
    StoryPoints,
    /// Absolute person-days.
    PersonDays,
}

impl RoomType {
    pub(crate) fn write(
        self,
        w: &mut BitWriter,
    ) -> Result<(), ProtocolError> {
        w.write_bool(self == RoomType::PersonDays)
    }

    pub(crate) fn read(r: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        Ok(if r.read_bool()? {
            RoomType::PersonDays
        } else {
            RoomType::StoryPoints
        })
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// A participant's current vote.
///
/// This is a closed set of four shapes. Matching on it is exhaustive, so
/// every place that handles a vote has to say what it does with each one.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(tag = "type", content = "value")]
pub enum Choice {
    /// No vote yet.
    #[default]
    None,
    /// A single card value.
    Number(u8),
    /// A free-form answer (e.g. "?" or "coffee").
    Text(String),
    /// A range, e.g. 2 to 3 person-days.
    Pair(u8, u8),
}

/// The 2-bit type tag that precedes every encoded [`Choice`].
///
/// The numbering is fixed by the wire format; `None` is deliberately the
/// last value so that an all-ones tag means "empty".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceTag {
    /// [`Choice::Number`], one payload byte.
    Number = 0,
    /// [`Choice::Text`], a zero-terminated string payload.
    Text = 1,
    /// [`Choice::Pair`], two payload bytes.
    Pair = 2,
    /// [`Choice::None`], no payload.
    None = 3,
}

impl ChoiceTag {
    /// Width of the tag field.
    pub const BITS: u32 = 2;

    pub(crate) fn write(
        self,
        w: &mut BitWriter,
    ) -> Result<(), ProtocolError> {
        w.write_bits(Self::BITS, self as u32)
    }

    pub(crate) fn read(r: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        // Every 2-bit value is a valid tag.
        Ok(match r.read_bits(Self::BITS)? {
            0 => ChoiceTag::Number,
            1 => ChoiceTag::Text,
            2 => ChoiceTag::Pair,
            _ => ChoiceTag::None,
        })
    }
}

impl Choice {
    /// The tag this choice is encoded with.
    pub fn tag(&self) -> ChoiceTag {
        match self {
            Choice::None => ChoiceTag::None,
            Choice::Number(_) => ChoiceTag::Number,
            Choice::Text(_) => ChoiceTag::Text,
            Choice::Pair(_, _) => ChoiceTag::Pair,
        }
    }

    /// Returns `true` for [`Choice::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Choice::None)
    }

    /// Caps a [`Choice::Text`] at [`MAX_TEXT_LEN`] bytes. Other variants
    /// are returned unchanged.
    #[must_use]
    pub fn clamped(self) -> Self {
        match self {
            Choice::Text(text) => Choice::Text(truncate_utf8(text, MAX_TEXT_LEN)),
            other => other,
        }
    }

    /// Writes tag and payload back to back.
    pub(crate) fn write(&self, w: &mut BitWriter) -> Result<(), ProtocolError> {
        self.tag().write(w)?;
        self.write_payload(w)
    }

    /// Writes only the byte-aligned payload; the tag was written earlier
    /// (the `Sync` snapshot groups all tags ahead of all payloads).
    pub(crate) fn write_payload(
        &self,
        w: &mut BitWriter,
    ) -> Result<(), ProtocolError> {
        w.align_to_byte();
        match self {
            Choice::None => Ok(()),
            Choice::Number(n) => w.write_u8(*n),
            Choice::Text(text) => w.write_string(text),
            Choice::Pair(low, high) => {
                w.write_u8(*low)?;
                w.write_u8(*high)
            }
        }
    }

    pub(crate) fn read(r: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        let tag = ChoiceTag::read(r)?;
        Self::read_payload(r, tag)
    }

    pub(crate) fn read_payload(
        r: &mut BitReader<'_>,
        tag: ChoiceTag,
    ) -> Result<Self, ProtocolError> {
        r.align_to_byte();
        Ok(match tag {
            ChoiceTag::None => Choice::None,
            ChoiceTag::Number => Choice::Number(r.read_u8()?),
            ChoiceTag::Text => Choice::Text(r.read_string()?),
            ChoiceTag::Pair => Choice::Pair(r.read_u8()?, r.read_u8()?),
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
