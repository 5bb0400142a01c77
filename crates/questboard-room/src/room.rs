//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task and is only reachable through an mpsc
//! channel, so every join, leave and update for that room is applied one
//! at a time, in arrival order, without a lock. Rooms never wait on each
//! other.

use std::collections::HashMap;

use questboard_protocol::{
    ClientMessage, JoinRequest, ParticipantId, RoomKey, RoomType,
    ServerMessage,
};
use tokio::sync::{mpsc, oneshot};

use crate::state::{Dispatch, Recipient, Room, RoomInfo};
use crate::{RoomConfig, RoomError};

/// Channel for delivering outbound messages to one participant's
/// connection handler.
///
/// Unbounded so that a slow socket never stalls the room actor.
pub type ParticipantSender = mpsc::UnboundedSender<ServerMessage>;

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in some variants is the reply channel: the
/// caller sends a command and waits for the answer on it.
pub(crate) enum RoomCommand {
    /// Add a participant to the room.
    Join {
        request: JoinRequest,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<ParticipantId, RoomError>>,
    },

    /// Remove a participant. Replies with how many are left.
    Leave {
        participant: ParticipantId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    /// Apply a message from a participant.
    Message {
        sender: ParticipantId,
        msg: ClientMessage,
    },

    /// Request a summary of the room.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone: it is just an `mpsc::Sender` and the room's key.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    key: RoomKey,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The key of the room this handle talks to.
    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    /// Adds a participant and returns the id the room assigned.
    pub async fn join(
        &self,
        request: JoinRequest,
        sender: ParticipantSender,
    ) -> Result<ParticipantId, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            request,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes a participant and returns how many remain.
    pub async fn leave(
        &self,
        participant: ParticipantId,
    ) -> Result<usize, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            participant,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Hands a participant's message to the room (fire-and-forget).
    ///
    /// Problems with the message itself are logged by the actor.
    pub async fn send_message(
        &self,
        sender: ParticipantId,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Message { sender, msg }).await
    }

    /// Requests a summary of the room.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to stop.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.key.clone())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    /// Per-participant outbound channels.
    senders: HashMap<ParticipantId, ParticipantSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::debug!(room = %self.room.key(), "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    request,
                    sender,
                    reply,
                } => {
                    let result = self.handle_join(request, sender);
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { participant, reply } => {
                    let result = self.handle_leave(participant);
                    let _ = reply.send(result);
                }
                RoomCommand::Message { sender, msg } => {
                    self.handle_message(sender, msg);
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.room.info());
                }
                RoomCommand::Shutdown => break,
            }
        }

        tracing::debug!(room = %self.room.key(), "room actor stopped");
    }

    fn handle_join(
        &mut self,
        request: JoinRequest,
        sender: ParticipantSender,
    ) -> Result<ParticipantId, RoomError> {
        let name = request.name.clone();
        let (id, dispatch) = self.room.join(request)?;
        self.senders.insert(id, sender);

        tracing::info!(
            room = %self.room.key(),
            participant = %id,
            name = %name,
            participants = self.room.len(),
            "participant joined"
        );
        self.dispatch(dispatch);
        Ok(id)
    }

    fn handle_leave(
        &mut self,
        participant: ParticipantId,
    ) -> Result<usize, RoomError> {
        let dispatch = self.room.leave(participant)?;
        self.senders.remove(&participant);

        tracing::info!(
            room = %self.room.key(),
            %participant,
            participants = self.room.len(),
            "participant left"
        );
        self.dispatch(dispatch);
        Ok(self.room.len())
    }

    fn handle_message(&mut self, sender: ParticipantId, msg: ClientMessage) {
        let opcode = msg.opcode();
        match self.room.apply(sender, msg) {
            Ok(dispatch) => self.dispatch(dispatch),
            Err(e) => tracing::debug!(
                room = %self.room.key(),
                %sender,
                ?opcode,
                error = %e,
                "message dropped"
            ),
        }
    }

    /// Delivers outbound messages to the right participants.
    fn dispatch(&self, dispatch: Vec<Dispatch>) {
        for (recipient, msg) in dispatch {
            match recipient {
                Recipient::All => {
                    for id in self.senders.keys() {
                        self.send_to(*id, msg.clone());
                    }
                }
                Recipient::Participant(id) => self.send_to(id, msg),
                Recipient::AllExcept(excluded) => {
                    for id in self.senders.keys() {
                        if *id != excluded {
                            self.send_to(*id, msg.clone());
                        }
                    }
                }
            }
        }
    }

    /// Sends to a single participant. Silently drops the message if the
    /// receiver is gone (the connection is already shutting down).
    fn send_to(&self, id: ParticipantId, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&id) {
            let _ = sender.send(msg);
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room(
    key: RoomKey,
    room_type: RoomType,
    config: &RoomConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_size);

    let actor = RoomActor {
        room: Room::new(key.clone(), room_type, config.max_participants),
        senders: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { key, sender: tx }
}
