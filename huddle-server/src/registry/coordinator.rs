use crate::chat::ChatStore;
use crate::error::RegistryError;
use crate::registry::RegistryCommand;
use crate::signaling::EventSink;
use huddle_core::{ChatMessage, ParticipantId, RoomId, RosterEntry, ServerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Participant {
    display_name: String,
    room: RoomId,
}

/// Authoritative presence registry plus signal relay.
///
/// Single-writer: the only way to touch the registry is through the command
/// channel, and each command is fully applied (broadcasts included) before
/// the next one is read. Rooms are independent sets keyed by `RoomId`;
/// membership vectors keep join order so roster snapshots are stable.
pub struct Coordinator {
    participants: HashMap<ParticipantId, Participant>,
    rooms: HashMap<RoomId, Vec<ParticipantId>>,
    command_rx: mpsc::Receiver<RegistryCommand>,
    sink: Arc<dyn EventSink>,
    chat: Arc<dyn ChatStore>,
}

impl Coordinator {
    pub fn new(
        command_rx: mpsc::Receiver<RegistryCommand>,
        sink: Arc<dyn EventSink>,
        chat: Arc<dyn ChatStore>,
    ) -> Self {
        Self {
            participants: HashMap::new(),
            rooms: HashMap::new(),
            command_rx,
            sink,
            chat,
        }
    }

    pub async fn run(mut self) {
        info!("Presence coordinator started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Command channel closed. Presence coordinator stopped");
    }

    async fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Join {
                id,
                room,
                display_name,
            } => self.handle_join(id, room, display_name).await,

            RegistryCommand::Leave { id } | RegistryCommand::Disconnect { id } => {
                self.handle_leave(id).await
            }

            RegistryCommand::Relay { from, to, signal } => {
                // Payload is opaque here. A disconnected destination is not
                // an error for the sender; its peer link will time out.
                self.sink.send(to, ServerEvent::Signal { from, signal }).await;
            }

            RegistryCommand::Message { from, text } => self.handle_message(from, text).await,
        }
    }

    async fn handle_join(&mut self, id: ParticipantId, room: RoomId, display_name: String) {
        info!(%id, %room, "Processing join for '{}'", display_name);

        // One room per participant: falling out of the old room, with its
        // broadcasts, completes before the new room sees the joiner.
        if let Ok((old_room, old_name)) = self.remove_participant(&id) {
            if old_room != room {
                self.broadcast_roster(&old_room).await;
                self.broadcast(
                    &old_room,
                    ServerEvent::UserLeft {
                        id,
                        display_name: old_name,
                    },
                )
                .await;
            }
        }

        self.participants.insert(
            id,
            Participant {
                display_name: display_name.clone(),
                room: room.clone(),
            },
        );
        self.rooms.entry(room.clone()).or_default().push(id);

        self.broadcast_roster(&room).await;
        self.broadcast(&room, ServerEvent::UserJoined { id, display_name })
            .await;

        let history = self.chat.history(&room).await;
        self.sink.send(id, ServerEvent::InitMessages { history }).await;
    }

    async fn handle_leave(&mut self, id: ParticipantId) {
        match self.remove_participant(&id) {
            Ok((room, display_name)) => {
                info!(%id, %room, "Participant left");
                self.broadcast_roster(&room).await;
                self.broadcast(&room, ServerEvent::UserLeft { id, display_name })
                    .await;
            }
            // Repeated cleanup (leave followed by disconnect) lands here.
            Err(e) => debug!("Leave ignored: {e}"),
        }
    }

    async fn handle_message(&mut self, from: ParticipantId, text: String) {
        let Some(participant) = self.participants.get(&from) else {
            warn!(%from, "Dropping chat message from participant outside any room");
            return;
        };

        let message = ChatMessage {
            author: participant.display_name.clone(),
            text,
            ts: unix_millis(),
        };
        let room = participant.room.clone();

        self.chat.append(&room, message.clone()).await;
        self.broadcast(&room, ServerEvent::NewMessage { message })
            .await;
    }

    /// Detach a participant from the registry, returning its old room and
    /// display name. Leaves no empty room entries behind.
    fn remove_participant(
        &mut self,
        id: &ParticipantId,
    ) -> Result<(RoomId, String), RegistryError> {
        let participant = self
            .participants
            .remove(id)
            .ok_or(RegistryError::UnknownParticipant(*id))?;

        if let Some(members) = self.rooms.get_mut(&participant.room) {
            members.retain(|m| m != id);
            if members.is_empty() {
                self.rooms.remove(&participant.room);
            }
        }

        Ok((participant.room, participant.display_name))
    }

    fn roster(&self, room: &RoomId) -> Vec<RosterEntry> {
        self.rooms
            .get(room)
            .into_iter()
            .flatten()
            .filter_map(|id| {
                self.participants.get(id).map(|p| RosterEntry {
                    id: *id,
                    display_name: p.display_name.clone(),
                })
            })
            .collect()
    }

    async fn broadcast_roster(&self, room: &RoomId) {
        let users = self.roster(room);
        self.broadcast(room, ServerEvent::RoomUsers { users }).await;
    }

    async fn broadcast(&self, room: &RoomId, event: ServerEvent) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for id in members {
            self.sink.send(*id, event.clone()).await;
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
