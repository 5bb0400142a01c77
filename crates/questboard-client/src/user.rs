//! The local participant.

use questboard_protocol::{
    Choice, JoinRequest, MAX_NAME_LEN, RoomKey, RoomType, truncate_utf8,
};
use serde::{Deserialize, Serialize};

/// What this client says about itself.
///
/// Survives reconnects: every new connection joins with these values, so
/// a vote cast while the socket was down is not lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub name: String,
    pub hero: u8,
    pub spectator: bool,
    pub choice: Choice,
    /// Changed the vote after the room was revealed.
    pub edited: bool,
}

impl LocalUser {
    /// Number of heroes [`cycle_hero`](Self::cycle_hero) rotates through.
    pub const HERO_COUNT: u8 = 32;

    /// A user called `name`, cut to the server's name cap.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: truncate_utf8(name.into(), MAX_NAME_LEN),
            hero: 0,
            spectator: false,
            choice: Choice::None,
            edited: false,
        }
    }

    #[must_use]
    pub fn with_hero(mut self, hero: u8) -> Self {
        self.hero = hero;
        self
    }

    #[must_use]
    pub fn with_spectator(mut self, spectator: bool) -> Self {
        self.spectator = spectator;
        self
    }

    #[must_use]
    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choice = choice;
        self
    }

    /// Applies a vote and returns the choice to announce, if any.
    ///
    /// - Picking the current choice again before the reveal withdraws it.
    /// - Picking the current choice again after the reveal changes nothing
    ///   and announces nothing.
    /// - Anything else replaces the vote; after the reveal that marks the
    ///   user as `edited`.
    pub fn choose(&mut self, choice: Choice, revealed: bool) -> Option<Choice> {
        let choice = choice.clamped();
        if choice == self.choice {
            if revealed {
                return None;
            }
            self.choice = Choice::None;
        } else {
            self.edited = revealed;
            self.choice = choice;
        }
        Some(self.choice.clone())
    }

    /// Steps to the next (`dir > 0`) or previous hero, wrapping around
    /// [`Self::HERO_COUNT`]. Returns the new hero.
    pub fn cycle_hero(&mut self, dir: i8) -> u8 {
        let count = i16::from(Self::HERO_COUNT);
        let next = (i16::from(self.hero) + i16::from(dir)).rem_euclid(count);
        // rem_euclid keeps the value in 0..32.
        self.hero = next as u8;
        self.hero
    }

    /// Forgets the vote. Called when a new quest starts.
    pub fn reset_choice(&mut self) {
        self.choice = Choice::None;
        self.edited = false;
    }

    /// The `Join` this user sends when a connection opens.
    pub fn join_request(&self, room: RoomKey, room_type: RoomType) -> JoinRequest {
        JoinRequest {
            hero: self.hero,
            room_type,
            spectator: self.spectator,
            choice: self.choice.clone(),
            room,
            name: self.name.clone(),
        }
    }
}

impl Default for LocalUser {
    fn default() -> Self {
        Self::new("Unknown Hero")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_same_number_before_reveal_withdraws_vote() {
        let mut user = LocalUser::new("ann").with_choice(Choice::Number(3));

        let sent = user.choose(Choice::Number(3), false);

        assert_eq!(sent, Some(Choice::None));
        assert_eq!(user.choice, Choice::None);
        assert!(!user.edited);
    }

    #[test]
    fn test_choose_same_number_after_reveal_is_noop() {
        let mut user = LocalUser::new("ann").with_choice(Choice::Number(3));

        let sent = user.choose(Choice::Number(3), true);

        assert_eq!(sent, None);
        assert_eq!(user.choice, Choice::Number(3));
        assert!(!user.edited);
    }

    #[test]
    fn test_choose_different_after_reveal_marks_edited() {
        let mut user = LocalUser::new("ann").with_choice(Choice::Number(3));

        let sent = user.choose(Choice::Pair(3, 5), true);

        assert_eq!(sent, Some(Choice::Pair(3, 5)));
        assert!(user.edited);
    }

    #[test]
    fn test_choose_different_before_reveal_clears_edited() {
        let mut user = LocalUser::new("ann").with_choice(Choice::Number(3));
        user.edited = true;

        user.choose(Choice::Text("?".into()), false);

        assert_eq!(user.choice, Choice::Text("?".into()));
        assert!(!user.edited);
    }

    #[test]
    fn test_choose_same_pair_before_reveal_withdraws_vote() {
        let mut user = LocalUser::new("ann").with_choice(Choice::Pair(1, 2));
        assert_eq!(user.choose(Choice::Pair(1, 2), false), Some(Choice::None));
    }

    #[test]
    fn test_cycle_hero_wraps_both_ways() {
        let mut user = LocalUser::new("ann").with_hero(31);
        assert_eq!(user.cycle_hero(1), 0);
        assert_eq!(user.cycle_hero(-1), 31);
        assert_eq!(user.cycle_hero(-1), 30);
    }

    #[test]
    fn test_cycle_hero_out_of_range_hero_lands_in_range() {
        let mut user = LocalUser::new("ann").with_hero(200);
        assert!(user.cycle_hero(1) < LocalUser::HERO_COUNT);
    }

    #[test]
    fn test_join_request_carries_user_fields() {
        let user = LocalUser::new("ann")
            .with_hero(4)
            .with_spectator(true)
            .with_choice(Choice::Number(8));

        let join = user.join_request(RoomKey::new("R1"), RoomType::PersonDays);

        assert_eq!(join.name, "ann");
        assert_eq!(join.hero, 4);
        assert!(join.spectator);
        assert_eq!(join.choice, Choice::Number(8));
        assert_eq!(join.room, RoomKey::new("R1"));
        assert_eq!(join.room_type, RoomType::PersonDays);
    }

    #[test]
    fn test_new_long_name_is_cut_to_cap() {
        let user = LocalUser::new("n".repeat(300));
        assert_eq!(user.name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_choose_long_text_is_clamped_before_toggle() {
        let mut user = LocalUser::new("ann");
        let long = Choice::Text("x".repeat(200));

        let sent = user.choose(long.clone(), false).unwrap();
        assert_eq!(sent, Choice::Text("x".repeat(questboard_protocol::MAX_TEXT_LEN)));
        // The same long text again matches the stored, clamped vote.
        assert_eq!(user.choose(long, false), Some(Choice::None));
    }
}
