//! Room registry: creates rooms on first join, destroys them when empty,
//! and tracks which connection is which participant.

use std::collections::HashMap;
use std::sync::Arc;

use questboard_protocol::{JoinRequest, ParticipantId, RoomKey};
use questboard_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::room::spawn_room;
use crate::{ParticipantSender, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// The registry's record of one joined connection.
///
/// The connection handler keeps a copy and sends its updates straight to
/// `handle`, so routine traffic never touches the registry.
#[derive(Debug, Clone)]
pub struct Membership {
    pub room: RoomKey,
    pub participant: ParticipantId,
    pub handle: RoomHandle,
}

/// One key's entry in the registry.
///
/// Joins and leaves for the same key serialize on `state`; different keys
/// never wait on each other.
struct RoomSlot {
    state: Mutex<SlotState>,
}

enum SlotState {
    /// Inserted by a joiner that has not spawned the room yet.
    Vacant,
    Live(RoomHandle),
    /// Torn down by the last leave. A joiner that finds this retries with a
    /// fresh slot.
    Closed,
}

/// Manages all live rooms and the connections joined to them.
///
/// A room is in the registry exactly as long as it has participants. The
/// room map is locked only to look up or swap a slot. The "last one out"
/// teardown and a concurrent "first one in" for the same key both hold the
/// slot's lock while talking to the actor, so the joiner either finds the
/// old room still alive or creates a fresh one.
pub struct RoomRegistry {
    config: RoomConfig,
    rooms: Mutex<HashMap<RoomKey, Arc<RoomSlot>>>,
    /// Joined connections. A connection is in at most ONE room.
    members: Mutex<HashMap<ConnectionId, (Membership, Arc<RoomSlot>)>>,
}

impl RoomRegistry {
    /// Creates an empty registry. Every room it creates uses `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
            rooms: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
        }
    }

    /// Joins `conn` to the room named in `request`, creating the room if
    /// it does not exist yet.
    ///
    /// On success the room has already queued a `Sync` for the joiner on
    /// `sender` and announced it to everyone else.
    pub async fn join(
        &self,
        conn: ConnectionId,
        request: JoinRequest,
        sender: ParticipantSender,
    ) -> Result<Membership, RoomError> {
        if self.members.lock().await.contains_key(&conn) {
            return Err(RoomError::AlreadyJoined(conn));
        }

        let key = request.room.clone();
        loop {
            let slot = self.slot(&key).await;
            let mut state = slot.state.lock().await;

            let mut created = false;
            let handle =
                match std::mem::replace(&mut *state, SlotState::Closed) {
                    SlotState::Live(handle) => handle,
                    SlotState::Vacant => {
                        created = true;
                        tracing::info!(
                            room = %key,
                            room_type = ?request.room_type,
                            "room created"
                        );
                        spawn_room(key.clone(), request.room_type, &self.config)
                    }
                    SlotState::Closed => {
                        drop(state);
                        self.forget(&key, &slot).await;
                        continue;
                    }
                };
            *state = SlotState::Live(handle.clone());

            return match handle.join(request, sender).await {
                Ok(participant) => {
                    let membership = Membership {
                        room: key,
                        participant,
                        handle,
                    };
                    self.members
                        .lock()
                        .await
                        .insert(conn, (membership.clone(), Arc::clone(&slot)));
                    Ok(membership)
                }
                Err(e) => {
                    if created {
                        *state = SlotState::Closed;
                        self.forget(&key, &slot).await;
                        drop(state);
                        let _ = handle.shutdown().await;
                        tracing::info!(room = %key, "room destroyed");
                    }
                    Err(e)
                }
            };
        }
    }

    /// Removes `conn` from its room. Destroys the room if it was the last
    /// participant.
    pub async fn leave(&self, conn: ConnectionId) -> Result<(), RoomError> {
        let (membership, slot) = self
            .members
            .lock()
            .await
            .remove(&conn)
            .ok_or(RoomError::NotJoined(conn))?;

        let mut state = slot.state.lock().await;
        let remaining =
            membership.handle.leave(membership.participant).await?;
        if remaining == 0 {
            *state = SlotState::Closed;
            self.forget(&membership.room, &slot).await;
            drop(state);
            let _ = membership.handle.shutdown().await;
            tracing::info!(room = %membership.room, "room destroyed");
        }
        Ok(())
    }

    /// The slot for `key`, inserting a vacant one if there is none.
    async fn slot(&self, key: &RoomKey) -> Arc<RoomSlot> {
        let mut rooms = self.rooms.lock().await;
        let slot = rooms.entry(key.clone()).or_insert_with(|| {
            Arc::new(RoomSlot {
                state: Mutex::new(SlotState::Vacant),
            })
        });
        Arc::clone(slot)
    }

    /// Drops `slot` from the map unless it was already replaced.
    async fn forget(&self, key: &RoomKey, slot: &Arc<RoomSlot>) {
        let mut rooms = self.rooms.lock().await;
        if rooms.get(key).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            rooms.remove(key);
        }
    }

    async fn live_handle(&self, key: &RoomKey) -> Option<RoomHandle> {
        let slot = self.rooms.lock().await.get(key).cloned()?;
        let state = slot.state.lock().await;
        match &*state {
            SlotState::Live(handle) => Some(handle.clone()),
            SlotState::Vacant | SlotState::Closed => None,
        }
    }

    /// The membership of a joined connection.
    pub async fn membership(&self, conn: ConnectionId) -> Option<Membership> {
        self.members
            .lock()
            .await
            .get(&conn)
            .map(|(membership, _)| membership.clone())
    }

    /// Returns info about a specific room.
    pub async fn room_info(&self, key: &RoomKey) -> Option<RoomInfo> {
        let handle = self.live_handle(key).await?;
        handle.info().await.ok()
    }

    /// Returns the number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Lists the keys of all live rooms.
    pub async fn room_keys(&self) -> Vec<RoomKey> {
        self.rooms.lock().await.keys().cloned().collect()
    }

    /// Returns the number of joined connections across all rooms.
    pub async fn member_count(&self) -> usize {
        self.members.lock().await.len()
    }

    /// Shuts every room down and forgets all members.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self.rooms.lock().await.drain().collect();
        self.members.lock().await.clear();
        for (key, slot) in slots {
            let mut state = slot.state.lock().await;
            if let SlotState::Live(handle) =
                std::mem::replace(&mut *state, SlotState::Closed)
            {
                let _ = handle.shutdown().await;
                tracing::debug!(room = %key, "room shut down");
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
