//! The authoritative state of one room.
//!
//! [`Room`] is plain data plus the rules for changing it. Every operation
//! mutates the room and returns the messages that should go out, each
//! tagged with a [`Recipient`]. It never touches a channel or a socket,
//! which keeps the voting rules testable without a runtime; the room actor
//! does the delivering.

use std::collections::BTreeMap;

use questboard_protocol::{
    Choice, ClientMessage, JoinRequest, MAX_NAME_LEN, MAX_TEXT_LEN,
    ParticipantId, ParticipantInfo, RoomKey, RoomType, ServerMessage,
    Snapshot, truncate_utf8,
};
use serde::Serialize;

use crate::RoomError;

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every participant in the room.
    All,
    /// One participant.
    Participant(ParticipantId),
    /// Everyone except the given participant (usually the sender).
    AllExcept(ParticipantId),
}

/// A message paired with the participants it goes to.
pub type Dispatch = (Recipient, ServerMessage);

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// One joined user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub hero: u8,
    pub spectator: bool,
    pub choice: Choice,
    /// Changed their choice after the room was revealed.
    pub edited: bool,
}

impl Participant {
    fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id,
            name: self.name.clone(),
            hero: self.hero,
            spectator: self.spectator,
            choice: self.choice.clone(),
            edited: self.edited,
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Summary of a room for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    pub key: RoomKey,
    pub quest: u32,
    pub revealed: bool,
    pub room_type: RoomType,
    pub voters: usize,
    pub spectators: usize,
}

impl RoomInfo {
    /// Voters and spectators together.
    pub fn participant_count(&self) -> usize {
        self.voters + self.spectators
    }
}

/// A voting session.
///
/// Voters and spectators live in separate rosters; a participant is in
/// exactly one of them, matching its `spectator` flag.
#[derive(Debug, Clone)]
pub struct Room {
    key: RoomKey,
    quest: u32,
    revealed: bool,
    room_type: RoomType,
    max_participants: usize,
    voters: BTreeMap<ParticipantId, Participant>,
    spectators: BTreeMap<ParticipantId, Participant>,
}

impl Room {
    /// Creates an empty room at quest 0.
    pub fn new(
        key: RoomKey,
        room_type: RoomType,
        max_participants: usize,
    ) -> Self {
        Self {
            key,
            quest: 0,
            revealed: false,
            room_type,
            max_participants: max_participants
                .min(ParticipantId::MAX_PARTICIPANTS),
            voters: BTreeMap::new(),
            spectators: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    pub fn quest(&self) -> u32 {
        self.quest
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    pub fn len(&self) -> usize {
        self.voters.len() + self.spectators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty() && self.spectators.is_empty()
    }

    /// Looks a participant up in either roster.
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.voters.get(&id).or_else(|| self.spectators.get(&id))
    }

    /// All participants ordered by id.
    pub fn participants(&self) -> Vec<&Participant> {
        let mut all: Vec<_> =
            self.voters.values().chain(self.spectators.values()).collect();
        all.sort_by_key(|p| p.id);
        all
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            key: self.key.clone(),
            quest: self.quest,
            revealed: self.revealed,
            room_type: self.room_type,
            voters: self.voters.len(),
            spectators: self.spectators.len(),
        }
    }

    /// The full state as seen by participant `you`.
    pub fn snapshot(&self, you: ParticipantId) -> Snapshot {
        Snapshot {
            you,
            room_type: self.room_type,
            revealed: self.revealed,
            // The wire carries the low 8 bits.
            quest: self.quest as u8,
            participants: self
                .participants()
                .into_iter()
                .map(Participant::info)
                .collect(),
        }
    }

    // -- Membership ---------------------------------------------------------

    /// Adds a participant under the smallest free id.
    ///
    /// Names and text choices are cut to their byte caps so a full room's
    /// `Sync` always fits in one frame. The joiner gets a `Sync` snapshot (which includes itself); everyone
    /// else gets `ParticipantJoined`.
    pub fn join(
        &mut self,
        request: JoinRequest,
    ) -> Result<(ParticipantId, Vec<Dispatch>), RoomError> {
        let id = self
            .free_id()
            .ok_or_else(|| RoomError::RoomFull(self.key.clone()))?;

        let participant = Participant {
            id,
            name: truncate_utf8(request.name, MAX_NAME_LEN),
            hero: request.hero,
            spectator: request.spectator,
            choice: request.choice.clamped(),
            edited: false,
        };
        let announcement =
            ServerMessage::ParticipantJoined(participant.info());
        self.roster_mut(participant.spectator).insert(id, participant);

        let dispatch = vec![
            (
                Recipient::Participant(id),
                ServerMessage::Sync(self.snapshot(id)),
            ),
            (Recipient::AllExcept(id), announcement),
        ];
        Ok((id, dispatch))
    }

    /// Removes a participant and tells the rest of the room.
    pub fn leave(
        &mut self,
        id: ParticipantId,
    ) -> Result<Vec<Dispatch>, RoomError> {
        self.remove(id).ok_or(RoomError::UnknownParticipant(id))?;
        if self.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![(Recipient::All, ServerMessage::ParticipantLeft(id))])
    }

    // -- Messages -----------------------------------------------------------

    /// Applies one message from a joined participant.
    pub fn apply(
        &mut self,
        sender: ParticipantId,
        msg: ClientMessage,
    ) -> Result<Vec<Dispatch>, RoomError> {
        if self.participant(sender).is_none() {
            return Err(RoomError::UnknownParticipant(sender));
        }

        let dispatch = match msg {
            ClientMessage::Join(_) => {
                return Err(RoomError::UnexpectedJoin(sender));
            }
            ClientMessage::Reveal => {
                self.revealed = true;
                vec![(Recipient::All, ServerMessage::Reveal)]
            }
            ClientMessage::ResetRoom { room_type } => {
                self.reset(room_type);
                vec![(Recipient::All, ServerMessage::ResetRoom { room_type })]
            }
            ClientMessage::UpdateChoice(choice) => {
                let choice = choice.clamped();
                let revealed = self.revealed;
                let p = self.participant_mut(sender)?;
                p.choice = choice.clone();
                p.edited = revealed;
                vec![(
                    Recipient::AllExcept(sender),
                    ServerMessage::UpdateChoice { id: sender, choice },
                )]
            }
            ClientMessage::UpdateName(name) => {
                let name = truncate_utf8(name, MAX_NAME_LEN);
                self.participant_mut(sender)?.name = name.clone();
                vec![(
                    Recipient::AllExcept(sender),
                    ServerMessage::UpdateName { id: sender, name },
                )]
            }
            ClientMessage::UpdateHero(hero) => {
                self.participant_mut(sender)?.hero = hero;
                vec![(
                    Recipient::AllExcept(sender),
                    ServerMessage::UpdateHero { id: sender, hero },
                )]
            }
            ClientMessage::UpdateSpectator(spectator) => {
                self.move_roster(sender, spectator)?;
                vec![(
                    Recipient::AllExcept(sender),
                    ServerMessage::UpdateSpectator {
                        id: sender,
                        spectator,
                    },
                )]
            }
            ClientMessage::Poke { target, text } => vec![(
                Recipient::AllExcept(sender),
                ServerMessage::Poke {
                    poker: sender,
                    poked: target,
                    text: truncate_utf8(text, MAX_TEXT_LEN),
                },
            )],
            ClientMessage::Ping => {
                vec![(Recipient::Participant(sender), ServerMessage::Pong)]
            }
            ClientMessage::Pong => Vec::new(),
        };
        Ok(dispatch)
    }

    /// Starts the next quest: clears every vote and the reveal flag.
    fn reset(&mut self, room_type: RoomType) {
        self.quest = self.quest.wrapping_add(1);
        self.revealed = false;
        self.room_type = room_type;
        for p in self.voters.values_mut().chain(self.spectators.values_mut())
        {
            p.choice = Choice::None;
            p.edited = false;
        }
    }

    // -- Roster bookkeeping ---------------------------------------------------

    fn free_id(&self) -> Option<ParticipantId> {
        (0..self.max_participants)
            .map(|n| ParticipantId(n as u8))
            .find(|id| self.participant(*id).is_none())
    }

    fn roster_mut(
        &mut self,
        spectator: bool,
    ) -> &mut BTreeMap<ParticipantId, Participant> {
        if spectator {
            &mut self.spectators
        } else {
            &mut self.voters
        }
    }

    fn participant_mut(
        &mut self,
        id: ParticipantId,
    ) -> Result<&mut Participant, RoomError> {
        if let Some(p) = self.voters.get_mut(&id) {
            return Ok(p);
        }
        self.spectators
            .get_mut(&id)
            .ok_or(RoomError::UnknownParticipant(id))
    }

    fn remove(&mut self, id: ParticipantId) -> Option<Participant> {
        self.voters.remove(&id).or_else(|| self.spectators.remove(&id))
    }

    fn move_roster(
        &mut self,
        id: ParticipantId,
        spectator: bool,
    ) -> Result<(), RoomError> {
        let mut p = self.remove(id).ok_or(RoomError::UnknownParticipant(id))?;
        p.spectator = spectator;
        self.roster_mut(spectator).insert(id, p);
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
