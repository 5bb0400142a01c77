//! The message catalogue.
//!
//! Every message starts with a 4-bit [`Opcode`] followed by a payload whose
//! layout is fixed by that opcode. There is no length prefix and no field
//! names on the wire; both sides simply read the fields in the order the
//! catalogue lists them.
//!
//! The catalogue is split by direction:
//!
//! - [`ClientMessage`]: what a client sends to the server.
//! - [`ServerMessage`]: what the server sends to a client.
//!
//! Several opcodes appear in both (the `Update*` family, `Reveal`,
//! `ResetRoom`, `Poke`, `Ping`/`Pong`), but the server-bound and
//! client-bound payloads differ: messages relayed by the server are
//! prefixed with the id of the participant they concern.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::codec::{BitReader, BitWriter};
use crate::types::{Choice, ChoiceTag, ParticipantId, RoomKey, RoomType};

/// Width of the opcode field that opens every message.
pub const OPCODE_BITS: u32 = 4;

/// Width of the participant count in a `Sync` snapshot.
pub const COUNT_BITS: u32 = 6;

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// The message type, carried in the first four bits.
///
/// Values 9, 10 and 12 are reserved and never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Join = 0,
    Reveal = 1,
    ResetRoom = 2,
    UpdateChoice = 3,
    UpdateName = 4,
    UpdateHero = 5,
    UpdateSpectator = 6,
    ParticipantJoined = 7,
    ParticipantLeft = 8,
    Sync = 11,
    Poke = 13,
    Ping = 14,
    Pong = 15,
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Opcode::Join,
            1 => Opcode::Reveal,
            2 => Opcode::ResetRoom,
            3 => Opcode::UpdateChoice,
            4 => Opcode::UpdateName,
            5 => Opcode::UpdateHero,
            6 => Opcode::UpdateSpectator,
            7 => Opcode::ParticipantJoined,
            8 => Opcode::ParticipantLeft,
            11 => Opcode::Sync,
            13 => Opcode::Poke,
            14 => Opcode::Ping,
            15 => Opcode::Pong,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        })
    }
}

impl Opcode {
    fn write(self, w: &mut BitWriter) -> Result<(), ProtocolError> {
        w.write_bits(OPCODE_BITS, self as u32)
    }

    fn read(r: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        // 4 bits always fit in a u8.
        Opcode::try_from(r.read_bits(OPCODE_BITS)? as u8)
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Everything a client needs to say when it joins a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Index of the avatar the participant picked.
    pub hero: u8,
    /// The room type the client believes the room has. Only used when the
    /// join creates the room.
    pub room_type: RoomType,
    pub spectator: bool,
    /// The vote the client already holds (e.g. from before a reconnect).
    pub choice: Choice,
    pub room: RoomKey,
    pub name: String,
}

/// One participant as the server describes it to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub name: String,
    pub hero: u8,
    pub spectator: bool,
    pub choice: Choice,
    /// Changed their vote after the room was revealed.
    pub edited: bool,
}

/// The full room state sent to a connection right after it joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// The id the server assigned to the receiving connection.
    pub you: ParticipantId,
    pub room_type: RoomType,
    pub revealed: bool,
    /// Quest number, truncated to the 8 bits the wire carries.
    pub quest: u8,
    /// Every participant in the room, the receiver included.
    pub participants: Vec<ParticipantInfo>,
}

impl Snapshot {
    /// Largest participant count the 6-bit count field can carry.
    pub const MAX_PARTICIPANTS: usize = (1 << COUNT_BITS) - 1;

    // The layout is a structure of arrays: all fixed-width columns first,
    // then the byte-aligned choice payloads, then the names.
    fn write(&self, w: &mut BitWriter) -> Result<(), ProtocolError> {
        let count = self.participants.len();
        if count > Self::MAX_PARTICIPANTS {
            return Err(ProtocolError::ValueOutOfRange {
                field: "participant count",
                value: count as u64,
                bits: COUNT_BITS,
            });
        }

        self.you.write(w)?;
        self.room_type.write(w)?;
        w.write_bool(self.revealed)?;
        w.write_bits(COUNT_BITS, count as u32)?;
        w.write_u8(self.quest)?;

        for p in &self.participants {
            p.id.write(w)?;
        }
        for p in &self.participants {
            w.write_u8(p.hero)?;
        }
        for p in &self.participants {
            w.write_bool(p.spectator)?;
        }
        for p in &self.participants {
            w.write_bool(p.edited)?;
        }
        for p in &self.participants {
            p.choice.tag().write(w)?;
        }
        for p in &self.participants {
            p.choice.write_payload(w)?;
        }
        for p in &self.participants {
            w.write_string(&p.name)?;
        }
        Ok(())
    }

    fn read(r: &mut BitReader<'_>) -> Result<Self, ProtocolError> {
        let you = ParticipantId::read(r)?;
        let room_type = RoomType::read(r)?;
        let revealed = r.read_bool()?;
        let count = r.read_bits(COUNT_BITS)? as usize;
        let quest = r.read_u8()?;

        let ids = (0..count)
            .map(|_| ParticipantId::read(r))
            .collect::<Result<Vec<_>, _>>()?;
        let heroes = (0..count)
            .map(|_| r.read_u8())
            .collect::<Result<Vec<_>, _>>()?;
        let spectators = (0..count)
            .map(|_| r.read_bool())
            .collect::<Result<Vec<_>, _>>()?;
        let edited = (0..count)
            .map(|_| r.read_bool())
            .collect::<Result<Vec<_>, _>>()?;
        let tags = (0..count)
            .map(|_| ChoiceTag::read(r))
            .collect::<Result<Vec<_>, _>>()?;
        let choices = tags
            .into_iter()
            .map(|tag| Choice::read_payload(r, tag))
            .collect::<Result<Vec<_>, _>>()?;
        let names = r.read_string_array(count)?;

        let participants = ids
            .into_iter()
            .zip(heroes)
            .zip(spectators)
            .zip(edited)
            .zip(choices)
            .zip(names)
            .map(|(((((id, hero), spectator), edited), choice), name)| {
                ParticipantInfo {
                    id,
                    name,
                    hero,
                    spectator,
                    choice,
                    edited,
                }
            })
            .collect();

        Ok(Self {
            you,
            room_type,
            revealed,
            quest,
            participants,
        })
    }
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// A message sent from a client to the server.
///
/// The `Update*` variants carry no participant id: the server knows who
/// sent them from the connection they arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join(JoinRequest),
    Reveal,
    ResetRoom { room_type: RoomType },
    UpdateChoice(Choice),
    UpdateName(String),
    UpdateHero(u8),
    UpdateSpectator(bool),
    Poke { target: ParticipantId, text: String },
    Ping,
    Pong,
}

impl ClientMessage {
    /// The opcode this message is sent under.
    pub fn opcode(&self) -> Opcode {
        match self {
            ClientMessage::Join(_) => Opcode::Join,
            ClientMessage::Reveal => Opcode::Reveal,
            ClientMessage::ResetRoom { .. } => Opcode::ResetRoom,
            ClientMessage::UpdateChoice(_) => Opcode::UpdateChoice,
            ClientMessage::UpdateName(_) => Opcode::UpdateName,
            ClientMessage::UpdateHero(_) => Opcode::UpdateHero,
            ClientMessage::UpdateSpectator(_) => Opcode::UpdateSpectator,
            ClientMessage::Poke { .. } => Opcode::Poke,
            ClientMessage::Ping => Opcode::Ping,
            ClientMessage::Pong => Opcode::Pong,
        }
    }

    /// Packs the message into its wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = BitWriter::new();
        self.opcode().write(&mut w)?;

        match self {
            ClientMessage::Join(join) => {
                w.write_u8(join.hero)?;
                join.room_type.write(&mut w)?;
                w.write_bool(join.spectator)?;
                join.choice.write(&mut w)?;
                w.write_string(join.room.as_str())?;
                w.write_string(&join.name)?;
            }
            ClientMessage::ResetRoom { room_type } => room_type.write(&mut w)?,
            ClientMessage::UpdateChoice(choice) => choice.write(&mut w)?,
            ClientMessage::UpdateName(name) => w.write_string(name)?,
            ClientMessage::UpdateHero(hero) => w.write_u8(*hero)?,
            ClientMessage::UpdateSpectator(spectator) => {
                w.write_bool(*spectator)?
            }
            ClientMessage::Poke { target, text } => {
                target.write(&mut w)?;
                w.write_string(text)?;
            }
            ClientMessage::Reveal | ClientMessage::Ping | ClientMessage::Pong => {}
        }

        Ok(w.finish())
    }

    /// Unpacks a message received from a client.
    ///
    /// Opcodes that only flow server-to-client (`ParticipantJoined`,
    /// `ParticipantLeft`, `Sync`) are rejected as
    /// [`ProtocolError::UnknownOpcode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = BitReader::new(bytes);
        let opcode = Opcode::read(&mut r)?;

        Ok(match opcode {
            Opcode::Join => {
                let hero = r.read_u8()?;
                let room_type = RoomType::read(&mut r)?;
                let spectator = r.read_bool()?;
                let choice = Choice::read(&mut r)?;
                let room = RoomKey::new(r.read_string()?);
                let name = r.read_string()?;
                ClientMessage::Join(JoinRequest {
                    hero,
                    room_type,
                    spectator,
                    choice,
                    room,
                    name,
                })
            }
            Opcode::Reveal => ClientMessage::Reveal,
            Opcode::ResetRoom => ClientMessage::ResetRoom {
                room_type: RoomType::read(&mut r)?,
            },
            Opcode::UpdateChoice => {
                ClientMessage::UpdateChoice(Choice::read(&mut r)?)
            }
            Opcode::UpdateName => ClientMessage::UpdateName(r.read_string()?),
            Opcode::UpdateHero => ClientMessage::UpdateHero(r.read_u8()?),
            Opcode::UpdateSpectator => {
                ClientMessage::UpdateSpectator(r.read_bool()?)
            }
            Opcode::Poke => ClientMessage::Poke {
                target: ParticipantId::read(&mut r)?,
                text: r.read_string()?,
            },
            Opcode::Ping => ClientMessage::Ping,
            Opcode::Pong => ClientMessage::Pong,
            Opcode::ParticipantJoined
            | Opcode::ParticipantLeft
            | Opcode::Sync => {
                return Err(ProtocolError::UnknownOpcode(opcode as u8));
            }
        })
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Reveal,
    ResetRoom {
        room_type: RoomType,
    },
    UpdateChoice {
        id: ParticipantId,
        choice: Choice,
    },
    UpdateName {
        id: ParticipantId,
        name: String,
    },
    UpdateHero {
        id: ParticipantId,
        hero: u8,
    },
    UpdateSpectator {
        id: ParticipantId,
        spectator: bool,
    },
    /// A new participant entered the room. `edited` is always `false`
    /// here; it is not carried on the wire.
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft(ParticipantId),
    Sync(Snapshot),
    Poke {
        poker: ParticipantId,
        poked: ParticipantId,
        text: String,
    },
    Ping,
    Pong,
}

impl ServerMessage {
    /// The opcode this message is sent under.
    pub fn opcode(&self) -> Opcode {
        match self {
            ServerMessage::Reveal => Opcode::Reveal,
            ServerMessage::ResetRoom { .. } => Opcode::ResetRoom,
            ServerMessage::UpdateChoice { .. } => Opcode::UpdateChoice,
            ServerMessage::UpdateName { .. } => Opcode::UpdateName,
            ServerMessage::UpdateHero { .. } => Opcode::UpdateHero,
            ServerMessage::UpdateSpectator { .. } => Opcode::UpdateSpectator,
            ServerMessage::ParticipantJoined(_) => Opcode::ParticipantJoined,
            ServerMessage::ParticipantLeft(_) => Opcode::ParticipantLeft,
            ServerMessage::Sync(_) => Opcode::Sync,
            ServerMessage::Poke { .. } => Opcode::Poke,
            ServerMessage::Ping => Opcode::Ping,
            ServerMessage::Pong => Opcode::Pong,
        }
    }

    /// Packs the message into its wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = BitWriter::new();
        self.opcode().write(&mut w)?;

        match self {
            ServerMessage::ResetRoom { room_type } => room_type.write(&mut w)?,
            ServerMessage::UpdateChoice { id, choice } => {
                id.write(&mut w)?;
                choice.write(&mut w)?;
            }
            ServerMessage::UpdateName { id, name } => {
                id.write(&mut w)?;
                w.write_string(name)?;
            }
            ServerMessage::UpdateHero { id, hero } => {
                id.write(&mut w)?;
                w.write_u8(*hero)?;
            }
            ServerMessage::UpdateSpectator { id, spectator } => {
                id.write(&mut w)?;
                w.write_bool(*spectator)?;
            }
            ServerMessage::ParticipantJoined(p) => {
                p.id.write(&mut w)?;
                w.write_u8(p.hero)?;
                w.write_bool(p.spectator)?;
                p.choice.write(&mut w)?;
                w.write_string(&p.name)?;
            }
            ServerMessage::ParticipantLeft(id) => id.write(&mut w)?,
            ServerMessage::Sync(snapshot) => snapshot.write(&mut w)?,
            ServerMessage::Poke { poker, poked, text } => {
                poker.write(&mut w)?;
                poked.write(&mut w)?;
                w.write_string(text)?;
            }
            ServerMessage::Reveal | ServerMessage::Ping | ServerMessage::Pong => {}
        }

        Ok(w.finish())
    }

    /// Unpacks a message received from the server.
    ///
    /// `Join` only flows client-to-server and is rejected as
    /// [`ProtocolError::UnknownOpcode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = BitReader::new(bytes);
        let opcode = Opcode::read(&mut r)?;

        Ok(match opcode {
            Opcode::Reveal => ServerMessage::Reveal,
            Opcode::ResetRoom => ServerMessage::ResetRoom {
                room_type: RoomType::read(&mut r)?,
            },
            Opcode::UpdateChoice => ServerMessage::UpdateChoice {
                id: ParticipantId::read(&mut r)?,
                choice: Choice::read(&mut r)?,
            },
            Opcode::UpdateName => ServerMessage::UpdateName {
                id: ParticipantId::read(&mut r)?,
                name: r.read_string()?,
            },
            Opcode::UpdateHero => ServerMessage::UpdateHero {
                id: ParticipantId::read(&mut r)?,
                hero: r.read_u8()?,
            },
            Opcode::UpdateSpectator => ServerMessage::UpdateSpectator {
                id: ParticipantId::read(&mut r)?,
                spectator: r.read_bool()?,
            },
            Opcode::ParticipantJoined => {
                let id = ParticipantId::read(&mut r)?;
                let hero = r.read_u8()?;
                let spectator = r.read_bool()?;
                let choice = Choice::read(&mut r)?;
                let name = r.read_string()?;
                ServerMessage::ParticipantJoined(ParticipantInfo {
                    id,
                    name,
                    hero,
                    spectator,
                    choice,
                    edited: false,
                })
            }
            Opcode::ParticipantLeft => {
                ServerMessage::ParticipantLeft(ParticipantId::read(&mut r)?)
            }
            Opcode::Sync => ServerMessage::Sync(Snapshot::read(&mut r)?),
            Opcode::Poke => ServerMessage::Poke {
                poker: ParticipantId::read(&mut r)?,
                poked: ParticipantId::read(&mut r)?,
                text: r.read_string()?,
            },
            Opcode::Ping => ServerMessage::Ping,
            Opcode::Pong => ServerMessage::Pong,
            Opcode::Join => {
                return Err(ProtocolError::UnknownOpcode(opcode as u8));
            }
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
