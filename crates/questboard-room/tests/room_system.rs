//! Integration tests for the room system: registry, actors and broadcast.

use std::sync::Arc;

use questboard_protocol::{
    Choice, ClientMessage, JoinRequest, RoomKey, RoomType, ServerMessage,
};
use questboard_room::{Membership, RoomConfig, RoomError, RoomRegistry};
use questboard_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

type Inbox = mpsc::UnboundedReceiver<ServerMessage>;

fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn request(room: &str, name: &str) -> JoinRequest {
    JoinRequest {
        hero: 1,
        room_type: RoomType::StoryPoints,
        spectator: false,
        choice: Choice::None,
        room: RoomKey::new(room),
        name: name.into(),
    }
}

async fn join(
    registry: &RoomRegistry,
    id: u64,
    room: &str,
    name: &str,
) -> (Membership, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let membership = registry
        .join(conn(id), request(room, name), tx)
        .await
        .unwrap();
    (membership, rx)
}

/// Everything currently queued for a participant.
fn drain(inbox: &mut Inbox) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = inbox.try_recv() {
        out.push(msg);
    }
    out
}

/// Waits until the actor has processed everything sent to it so far.
async fn settle(registry: &RoomRegistry, room: &str) {
    let _ = registry.room_info(&RoomKey::new(room)).await;
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test]
async fn test_join_creates_one_room_per_key() {
    let registry = RoomRegistry::default();

    join(&registry, 1, "R1", "ann").await;
    join(&registry, 2, "R1", "bo").await;
    join(&registry, 3, "R2", "cy").await;

    assert_eq!(registry.room_count().await, 2);
    let info = registry.room_info(&RoomKey::new("R1")).await.unwrap();
    assert_eq!(info.participant_count(), 2);
}

#[tokio::test]
async fn test_join_sends_sync_then_announces() {
    let registry = RoomRegistry::default();
    let (a, mut a_inbox) = join(&registry, 1, "R1", "ann").await;

    let (b, mut b_inbox) = join(&registry, 2, "R1", "bo").await;
    settle(&registry, "R1").await;

    let b_msgs = drain(&mut b_inbox);
    let [ServerMessage::Sync(snapshot)] = b_msgs.as_slice() else {
        panic!("expected one Sync, got {b_msgs:?}");
    };
    assert_eq!(snapshot.you, b.participant);
    let ids: Vec<_> = snapshot.participants.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![a.participant, b.participant]);

    let a_msgs = drain(&mut a_inbox);
    assert!(matches!(a_msgs.first(), Some(ServerMessage::Sync(_))));
    assert!(matches!(
        a_msgs.get(1),
        Some(ServerMessage::ParticipantJoined(info)) if info.name == "bo"
    ));
}

#[tokio::test]
async fn test_second_join_on_same_connection_is_rejected() {
    let registry = RoomRegistry::default();
    join(&registry, 1, "R1", "ann").await;
    let (tx, _rx) = mpsc::unbounded_channel();

    let result = registry.join(conn(1), request("R2", "ann"), tx).await;

    assert_eq!(result.unwrap_err(), RoomError::AlreadyJoined(conn(1)));
    assert_eq!(registry.room_count().await, 1);
    assert_eq!(registry.member_count().await, 1);
}

#[tokio::test]
async fn test_join_full_room_is_rejected_and_room_survives() {
    let registry = RoomRegistry::new(RoomConfig {
        max_participants: 2,
        ..RoomConfig::default()
    });
    join(&registry, 1, "R1", "ann").await;
    join(&registry, 2, "R1", "bo").await;
    let (tx, _rx) = mpsc::unbounded_channel();

    let result = registry.join(conn(3), request("R1", "cy"), tx).await;

    assert_eq!(result.unwrap_err(), RoomError::RoomFull(RoomKey::new("R1")));
    assert_eq!(registry.room_count().await, 1);
    assert!(registry.membership(conn(3)).await.is_none());
}

#[tokio::test]
async fn test_seventeenth_participant_does_not_fit() {
    let registry = RoomRegistry::default();
    for id in 0..16 {
        join(&registry, id, "R1", "p").await;
    }
    let (tx, _rx) = mpsc::unbounded_channel();

    let result = registry.join(conn(99), request("R1", "late"), tx).await;

    assert!(matches!(result, Err(RoomError::RoomFull(_))));
}

// =========================================================================
// Leave
// =========================================================================

#[tokio::test]
async fn test_leave_notifies_remaining_participants() {
    let registry = RoomRegistry::default();
    let (_, mut a_inbox) = join(&registry, 1, "R1", "ann").await;
    let (b, _) = join(&registry, 2, "R1", "bo").await;
    let (_, mut c_inbox) = join(&registry, 3, "R1", "cy").await;
    settle(&registry, "R1").await;
    drain(&mut a_inbox);
    drain(&mut c_inbox);

    registry.leave(conn(2)).await.unwrap();
    settle(&registry, "R1").await;

    let expected = vec![ServerMessage::ParticipantLeft(b.participant)];
    assert_eq!(drain(&mut a_inbox), expected);
    assert_eq!(drain(&mut c_inbox), expected);
    let info = registry.room_info(&RoomKey::new("R1")).await.unwrap();
    assert_eq!(info.participant_count(), 2);
}

#[tokio::test]
async fn test_leave_last_participant_destroys_room() {
    let registry = RoomRegistry::default();
    join(&registry, 1, "R1", "ann").await;

    registry.leave(conn(1)).await.unwrap();

    assert_eq!(registry.room_count().await, 0);
    assert!(registry.room_info(&RoomKey::new("R1")).await.is_none());
}

#[tokio::test]
async fn test_rejoin_after_destroy_creates_fresh_room() {
    let registry = RoomRegistry::default();
    let (a, _) = join(&registry, 1, "R1", "ann").await;
    a.handle
        .send_message(
            a.participant,
            ClientMessage::ResetRoom {
                room_type: RoomType::StoryPoints,
            },
        )
        .await
        .unwrap();
    settle(&registry, "R1").await;
    registry.leave(conn(1)).await.unwrap();

    let (_, mut inbox) = join(&registry, 2, "R1", "bo").await;
    settle(&registry, "R1").await;

    let info = registry.room_info(&RoomKey::new("R1")).await.unwrap();
    assert_eq!(info.quest, 0);
    assert_eq!(info.participant_count(), 1);
    let msgs = drain(&mut inbox);
    let [ServerMessage::Sync(snapshot)] = msgs.as_slice() else {
        panic!("expected one Sync, got {msgs:?}");
    };
    assert_eq!(snapshot.quest, 0);
}

#[tokio::test]
async fn test_leave_without_join_is_rejected() {
    let registry = RoomRegistry::default();

    assert_eq!(
        registry.leave(conn(5)).await,
        Err(RoomError::NotJoined(conn(5)))
    );
}

#[tokio::test]
async fn test_participant_count_tracks_live_connections() {
    let registry = RoomRegistry::default();
    for id in 1..=5 {
        join(&registry, id, "R1", "p").await;
    }
    for id in [2, 4] {
        registry.leave(conn(id)).await.unwrap();
    }

    let info = registry.room_info(&RoomKey::new("R1")).await.unwrap();

    assert_eq!(info.participant_count(), 3);
    assert_eq!(registry.member_count().await, 3);
}

// =========================================================================
// Updates and broadcast
// =========================================================================

#[tokio::test]
async fn test_update_choice_reaches_others_but_not_sender() {
    let registry = RoomRegistry::default();
    let (a, mut a_inbox) = join(&registry, 1, "R1", "ann").await;
    let (_, mut b_inbox) = join(&registry, 2, "R1", "bo").await;
    settle(&registry, "R1").await;
    drain(&mut a_inbox);
    drain(&mut b_inbox);

    a.handle
        .send_message(
            a.participant,
            ClientMessage::UpdateChoice(Choice::Number(5)),
        )
        .await
        .unwrap();
    settle(&registry, "R1").await;

    assert!(drain(&mut a_inbox).is_empty());
    assert_eq!(
        drain(&mut b_inbox),
        vec![ServerMessage::UpdateChoice {
            id: a.participant,
            choice: Choice::Number(5)
        }]
    );
}

#[tokio::test]
async fn test_reveal_and_reset_reach_everyone() {
    let registry = RoomRegistry::default();
    let (a, mut a_inbox) = join(&registry, 1, "R1", "ann").await;
    let (_, mut b_inbox) = join(&registry, 2, "R1", "bo").await;
    settle(&registry, "R1").await;
    drain(&mut a_inbox);
    drain(&mut b_inbox);

    a.handle
        .send_message(a.participant, ClientMessage::Reveal)
        .await
        .unwrap();
    a.handle
        .send_message(
            a.participant,
            ClientMessage::ResetRoom {
                room_type: RoomType::PersonDays,
            },
        )
        .await
        .unwrap();
    settle(&registry, "R1").await;

    let expected = vec![
        ServerMessage::Reveal,
        ServerMessage::ResetRoom {
            room_type: RoomType::PersonDays,
        },
    ];
    assert_eq!(drain(&mut a_inbox), expected);
    assert_eq!(drain(&mut b_inbox), expected);
    let info = registry.room_info(&RoomKey::new("R1")).await.unwrap();
    assert_eq!(info.quest, 1);
    assert!(!info.revealed);
    assert_eq!(info.room_type, RoomType::PersonDays);
}

#[tokio::test]
async fn test_rooms_do_not_see_each_other() {
    let registry = RoomRegistry::default();
    let (a, _) = join(&registry, 1, "R1", "ann").await;
    let (_, mut other) = join(&registry, 2, "R2", "bo").await;
    settle(&registry, "R2").await;
    drain(&mut other);

    a.handle
        .send_message(a.participant, ClientMessage::Reveal)
        .await
        .unwrap();
    settle(&registry, "R1").await;
    settle(&registry, "R2").await;

    assert!(drain(&mut other).is_empty());
}

#[tokio::test]
async fn test_message_from_departed_participant_is_dropped() {
    let registry = RoomRegistry::default();
    let (a, _) = join(&registry, 1, "R1", "ann").await;
    let (_, mut b_inbox) = join(&registry, 2, "R1", "bo").await;
    registry.leave(conn(1)).await.unwrap();
    settle(&registry, "R1").await;
    drain(&mut b_inbox);

    a.handle
        .send_message(a.participant, ClientMessage::Reveal)
        .await
        .unwrap();
    settle(&registry, "R1").await;

    assert!(drain(&mut b_inbox).is_empty());
    let info = registry.room_info(&RoomKey::new("R1")).await.unwrap();
    assert!(!info.revealed);
}

#[tokio::test]
async fn test_shutdown_stops_all_rooms() {
    let registry = RoomRegistry::default();
    let (a, _) = join(&registry, 1, "R1", "ann").await;
    join(&registry, 2, "R2", "bo").await;

    registry.shutdown().await;

    assert_eq!(registry.room_count().await, 0);
    assert_eq!(registry.member_count().await, 0);
    // Shutdown is queued ahead of this request, so the actor stops first.
    assert_eq!(
        a.handle.info().await.unwrap_err(),
        RoomError::Unavailable(RoomKey::new("R1"))
    );
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_racing_last_leave_lands_in_live_room() {
    let registry = Arc::new(RoomRegistry::default());

    for round in 0..200u64 {
        let first = round * 2;
        let second = first + 1;
        join(&registry, first, "R1", "ann").await;

        let leaver = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.leave(conn(first)).await })
        };
        let joiner = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let (tx, rx) = mpsc::unbounded_channel();
                let joined =
                    registry.join(conn(second), request("R1", "bo"), tx).await;
                (joined, rx)
            })
        };
        leaver.await.unwrap().unwrap();
        let (joined, _inbox) = joiner.await.unwrap();
        let membership = joined.unwrap();

        // Whichever order they ran in, the joiner is alone in a live room.
        let info = membership.handle.info().await.unwrap();
        assert_eq!(info.participant_count(), 1, "round {round}");
        assert_eq!(registry.room_count().await, 1, "round {round}");
        assert_eq!(
            registry.room_info(&RoomKey::new("R1")).await,
            Some(info),
            "round {round}"
        );

        registry.leave(conn(second)).await.unwrap();
        assert_eq!(registry.room_count().await, 0, "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_on_one_key_share_one_room() {
    let registry = Arc::new(RoomRegistry::default());

    let joins: Vec<_> = (0..12u64)
        .map(|id| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let (tx, rx) = mpsc::unbounded_channel();
                let joined =
                    registry.join(conn(id), request("R1", "x"), tx).await;
                (joined, rx)
            })
        })
        .collect();
    let mut inboxes = Vec::new();
    for handle in joins {
        let (joined, rx) = handle.await.unwrap();
        joined.unwrap();
        inboxes.push(rx);
    }

    assert_eq!(registry.room_count().await, 1);
    assert_eq!(registry.member_count().await, 12);
    let info = registry.room_info(&RoomKey::new("R1")).await.unwrap();
    assert_eq!(info.participant_count(), 12);
}
