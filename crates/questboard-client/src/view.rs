//! The client's picture of the room.
//!
//! A [`RoomView`] is rebuilt wholesale by every `Sync` and then kept up to
//! date by applying the deltas the server relays. Local actions (voting,
//! renaming, revealing) are applied to it optimistically before the server
//! has seen them.

use questboard_protocol::{
    Choice, ClientMessage, JoinRequest, MAX_NAME_LEN, ParticipantId,
    ParticipantInfo, RoomKey, RoomType, ServerMessage, truncate_utf8,
};
use serde::Serialize;
use tracing::debug;

use crate::LocalUser;

/// Room state as this client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomView {
    pub key: RoomKey,
    /// True between the `Sync` of the current connection and its loss.
    pub connected: bool,
    pub quest: u8,
    pub room_type: RoomType,
    pub revealed: bool,
    /// This client's participant id. Assigned by each `Sync`.
    pub you: Option<ParticipantId>,
    pub user: LocalUser,
    /// Everyone in the room, this client included, ordered by id.
    pub participants: Vec<ParticipantInfo>,
}

impl RoomView {
    pub fn new(key: RoomKey, user: LocalUser) -> Self {
        Self {
            key,
            connected: false,
            quest: 0,
            room_type: RoomType::default(),
            revealed: false,
            you: None,
            user,
            participants: Vec::new(),
        }
    }

    /// Voters other than this client.
    pub fn others(&self) -> impl Iterator<Item = &ParticipantInfo> {
        self.participants
            .iter()
            .filter(|p| Some(p.id) != self.you && !p.spectator)
    }

    /// Spectators other than this client.
    pub fn spectators(&self) -> impl Iterator<Item = &ParticipantInfo> {
        self.participants
            .iter()
            .filter(|p| Some(p.id) != self.you && p.spectator)
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantInfo> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// The `Join` to send on a fresh connection.
    pub fn join_request(&self) -> JoinRequest {
        self.user.join_request(self.key.clone(), self.room_type)
    }

    /// Marks the connection as lost. The roster stays as it was until the
    /// next `Sync` replaces it.
    pub fn disconnected(&mut self) {
        self.connected = false;
    }

    /// Applies a room-state message from the server.
    ///
    /// Returns `false` for messages that carry no room state (`Poke`,
    /// `Ping`, `Pong`) and for deltas about unknown participants, which
    /// are dropped.
    pub fn apply(&mut self, msg: ServerMessage) -> bool {
        match msg {
            ServerMessage::Sync(snapshot) => {
                self.you = Some(snapshot.you);
                self.room_type = snapshot.room_type;
                self.revealed = snapshot.revealed;
                self.quest = snapshot.quest;
                self.participants = snapshot.participants;
                self.participants.sort_by_key(|p| p.id);
                self.connected = true;
                self.sync_self();
                true
            }
            ServerMessage::Reveal => {
                self.revealed = true;
                true
            }
            ServerMessage::ResetRoom { room_type } => {
                self.quest = self.quest.wrapping_add(1);
                self.clear_round(room_type);
                true
            }
            ServerMessage::ParticipantJoined(info) => {
                self.participants.retain(|p| p.id != info.id);
                let at = self.participants.partition_point(|p| p.id < info.id);
                self.participants.insert(at, info);
                true
            }
            ServerMessage::ParticipantLeft(id) => {
                let before = self.participants.len();
                self.participants.retain(|p| p.id != id);
                self.participants.len() != before
            }
            ServerMessage::UpdateChoice { id, choice } => {
                let revealed = self.revealed;
                self.update(id, |p| {
                    p.choice = choice;
                    p.edited = revealed;
                })
            }
            ServerMessage::UpdateName { id, name } => {
                self.update(id, |p| p.name = name)
            }
            ServerMessage::UpdateHero { id, hero } => {
                self.update(id, |p| p.hero = hero)
            }
            ServerMessage::UpdateSpectator { id, spectator } => {
                self.update(id, |p| p.spectator = spectator)
            }
            ServerMessage::Poke { .. }
            | ServerMessage::Ping
            | ServerMessage::Pong => false,
        }
    }

    fn update(
        &mut self,
        id: ParticipantId,
        f: impl FnOnce(&mut ParticipantInfo),
    ) -> bool {
        match self.participants.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                f(p);
                true
            }
            None => {
                debug!(participant = %id, "update for unknown participant dropped");
                false
            }
        }
    }

    fn clear_round(&mut self, room_type: RoomType) {
        self.room_type = room_type;
        self.revealed = false;
        self.user.reset_choice();
        for p in &mut self.participants {
            p.choice = Choice::None;
            p.edited = false;
        }
    }

    /// Copies the local user onto its own roster entry.
    fn sync_self(&mut self) {
        let Some(you) = self.you else { return };
        let user = &self.user;
        if let Some(p) = self.participants.iter_mut().find(|p| p.id == you) {
            p.name.clone_from(&user.name);
            p.hero = user.hero;
            p.spectator = user.spectator;
            p.choice = user.choice.clone();
            p.edited = user.edited;
        }
    }

    // -----------------------------------------------------------------------
    // Local actions. Each returns the message to send, if any.
    // -----------------------------------------------------------------------

    pub fn choose(&mut self, choice: Choice) -> Option<ClientMessage> {
        let sent = self.user.choose(choice, self.revealed)?;
        self.sync_self();
        Some(ClientMessage::UpdateChoice(sent))
    }

    pub fn rename(&mut self, name: String) -> ClientMessage {
        let name = truncate_utf8(name, MAX_NAME_LEN);
        self.user.name.clone_from(&name);
        self.sync_self();
        ClientMessage::UpdateName(name)
    }

    pub fn set_hero(&mut self, hero: u8) -> ClientMessage {
        self.user.hero = hero;
        self.sync_self();
        ClientMessage::UpdateHero(hero)
    }

    pub fn cycle_hero(&mut self, dir: i8) -> ClientMessage {
        let hero = self.user.cycle_hero(dir);
        self.sync_self();
        ClientMessage::UpdateHero(hero)
    }

    pub fn set_spectator(&mut self, spectator: bool) -> ClientMessage {
        self.user.spectator = spectator;
        self.sync_self();
        ClientMessage::UpdateSpectator(spectator)
    }

    pub fn reveal(&mut self) -> ClientMessage {
        self.revealed = true;
        ClientMessage::Reveal
    }

    /// Starts a new round locally. The quest number moves when the server
    /// echoes the reset back, so it is counted once.
    pub fn new_quest(&mut self, room_type: RoomType) -> ClientMessage {
        self.clear_round(room_type);
        self.sync_self();
        ClientMessage::ResetRoom { room_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questboard_protocol::Snapshot;

    fn info(id: u8, name: &str, spectator: bool) -> ParticipantInfo {
        ParticipantInfo {
            id: ParticipantId(id),
            name: name.into(),
            hero: id,
            spectator,
            choice: Choice::None,
            edited: false,
        }
    }

    /// A view synced into a room with ann (0, us), bo (1) and cy (2, spectator).
    fn synced() -> RoomView {
        let mut view = RoomView::new(RoomKey::new("R1"), LocalUser::new("ann"));
        view.apply(ServerMessage::Sync(Snapshot {
            you: ParticipantId(0),
            room_type: RoomType::StoryPoints,
            revealed: false,
            quest: 4,
            participants: vec![
                info(2, "cy", true),
                info(0, "ann", false),
                info(1, "bo", false),
            ],
        }));
        view
    }

    fn ids<'a>(it: impl Iterator<Item = &'a ParticipantInfo>) -> Vec<u8> {
        it.map(|p| p.id.0).collect()
    }

    #[test]
    fn test_apply_sync_replaces_view_and_connects() {
        let view = synced();

        assert!(view.connected);
        assert_eq!(view.you, Some(ParticipantId(0)));
        assert_eq!(view.quest, 4);
        assert_eq!(ids(view.participants.iter()), vec![0, 1, 2]);
        assert_eq!(ids(view.others()), vec![1]);
        assert_eq!(ids(view.spectators()), vec![2]);
    }

    #[test]
    fn test_apply_update_choice_after_reveal_marks_edited() {
        let mut view = synced();
        view.apply(ServerMessage::Reveal);

        view.apply(ServerMessage::UpdateChoice {
            id: ParticipantId(1),
            choice: Choice::Number(8),
        });

        let bo = view.participant(ParticipantId(1)).unwrap();
        assert_eq!(bo.choice, Choice::Number(8));
        assert!(bo.edited);
    }

    #[test]
    fn test_apply_update_for_unknown_participant_is_dropped() {
        let mut view = synced();
        let before = view.clone();

        let changed = view.apply(ServerMessage::UpdateName {
            id: ParticipantId(9),
            name: "ghost".into(),
        });

        assert!(!changed);
        assert_eq!(view, before);
    }

    #[test]
    fn test_apply_joined_and_left_keep_order() {
        let mut view = synced();

        view.apply(ServerMessage::ParticipantJoined(info(5, "dee", false)));
        view.apply(ServerMessage::ParticipantJoined(info(3, "eve", false)));
        view.apply(ServerMessage::ParticipantLeft(ParticipantId(1)));

        assert_eq!(ids(view.participants.iter()), vec![0, 2, 3, 5]);
        assert_eq!(ids(view.others()), vec![3, 5]);
    }

    #[test]
    fn test_apply_spectator_update_moves_between_projections() {
        let mut view = synced();

        view.apply(ServerMessage::UpdateSpectator {
            id: ParticipantId(1),
            spectator: true,
        });

        assert_eq!(ids(view.others()), Vec::<u8>::new());
        assert_eq!(ids(view.spectators()), vec![1, 2]);
    }

    #[test]
    fn test_apply_reset_bumps_quest_and_clears_round() {
        let mut view = synced();
        view.choose(Choice::Number(5));
        view.apply(ServerMessage::UpdateChoice {
            id: ParticipantId(1),
            choice: Choice::Number(3),
        });
        view.apply(ServerMessage::Reveal);

        view.apply(ServerMessage::ResetRoom {
            room_type: RoomType::PersonDays,
        });

        assert_eq!(view.quest, 5);
        assert!(!view.revealed);
        assert_eq!(view.room_type, RoomType::PersonDays);
        assert_eq!(view.user.choice, Choice::None);
        assert!(view.participants.iter().all(|p| p.choice.is_none()));
        assert_eq!(view.participants.len(), 3);
    }

    #[test]
    fn test_new_quest_then_echo_counts_once() {
        let mut view = synced();

        let msg = view.new_quest(RoomType::StoryPoints);
        view.apply(ServerMessage::ResetRoom {
            room_type: RoomType::StoryPoints,
        });

        assert_eq!(
            msg,
            ClientMessage::ResetRoom {
                room_type: RoomType::StoryPoints
            }
        );
        assert_eq!(view.quest, 5);
    }

    #[test]
    fn test_apply_reset_quest_wraps() {
        let mut view = synced();
        view.quest = u8::MAX;

        view.apply(ServerMessage::ResetRoom {
            room_type: RoomType::StoryPoints,
        });

        assert_eq!(view.quest, 0);
    }

    #[test]
    fn test_choose_updates_own_roster_entry() {
        let mut view = synced();

        let msg = view.choose(Choice::Number(5));

        assert_eq!(msg, Some(ClientMessage::UpdateChoice(Choice::Number(5))));
        let me = view.participant(ParticipantId(0)).unwrap();
        assert_eq!(me.choice, Choice::Number(5));
    }

    #[test]
    fn test_choose_repeat_after_reveal_sends_nothing() {
        let mut view = synced();
        view.choose(Choice::Number(5));
        view.reveal();

        assert_eq!(view.choose(Choice::Number(5)), None);
        assert!(!view.user.edited);
    }

    #[test]
    fn test_local_actions_before_sync_only_touch_user() {
        let mut view = RoomView::new(RoomKey::new("R1"), LocalUser::new("ann"));

        view.rename("annie".into());
        view.cycle_hero(-1);

        assert_eq!(view.user.name, "annie");
        assert_eq!(view.user.hero, 31);
        assert!(view.participants.is_empty());
        assert_eq!(view.join_request().name, "annie");
    }

    #[test]
    fn test_sync_keeps_local_user_authoritative() {
        let mut view = RoomView::new(
            RoomKey::new("R1"),
            LocalUser::new("ann").with_choice(Choice::Number(2)),
        );

        view.apply(ServerMessage::Sync(Snapshot {
            you: ParticipantId(0),
            room_type: RoomType::StoryPoints,
            revealed: false,
            quest: 0,
            participants: vec![info(0, "stale", false)],
        }));

        let me = view.participant(ParticipantId(0)).unwrap();
        assert_eq!(me.name, "ann");
        assert_eq!(me.choice, Choice::Number(2));
    }

    #[test]
    fn test_disconnected_keeps_roster() {
        let mut view = synced();

        view.disconnected();

        assert!(!view.connected);
        assert_eq!(view.participants.len(), 3);
    }

    #[test]
    fn test_room_view_serializes_for_ui() {
        let view = synced();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["key"], "R1");
        assert_eq!(json["participants"][1]["name"], "bo");
    }
}
