use crate::model::chat::ChatMessage;
use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use crate::model::signaling::{IceServerConfig, SignalPayload};
use serde::{Deserialize, Serialize};

/// Roster entry as broadcast in `room-users` snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: ParticipantId,
    pub display_name: String,
}

/// Events sent by a participant over its signaling socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinRoom {
        room: RoomId,
        display_name: String,
    },
    LeaveRoom {
        room: RoomId,
    },
    Signal {
        to: ParticipantId,
        signal: SignalPayload,
    },
    SendMessage {
        text: String,
    },
}

/// Events sent by the server to a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First frame after connect: the assigned session id plus the ICE
    /// servers the client should hand to its peer connections.
    Welcome {
        id: ParticipantId,
        ice_servers: Vec<IceServerConfig>,
    },
    /// Full roster snapshot, broadcast to every member (joiner included) on
    /// each membership change.
    RoomUsers { users: Vec<RosterEntry> },
    UserJoined {
        id: ParticipantId,
        display_name: String,
    },
    UserLeft {
        id: ParticipantId,
        display_name: String,
    },
    /// Stored history for the room, sent to the joiner only.
    InitMessages { history: Vec<ChatMessage> },
    NewMessage { message: ChatMessage },
    /// Relayed signaling payload, tagged with the sender's id.
    Signal {
        from: ParticipantId,
        signal: SignalPayload,
    },
}
