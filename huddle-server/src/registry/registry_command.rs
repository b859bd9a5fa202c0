use huddle_core::{ParticipantId, RoomId, SignalPayload};

/// Commands fed into the presence coordinator from the signaling sockets.
/// One queue for every mutation and relay, so each command is applied to
/// completion before the next is admitted.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Participant wants to enter a room. Implicitly leaves any prior room.
    Join {
        id: ParticipantId,
        room: RoomId,
        display_name: String,
    },

    /// Explicit departure from the participant's current room.
    Leave { id: ParticipantId },

    /// Transport-level disconnection. Same cleanup as `Leave`.
    Disconnect { id: ParticipantId },

    /// Opaque signaling payload addressed to another session.
    Relay {
        from: ParticipantId,
        to: ParticipantId,
        signal: SignalPayload,
    },

    /// Chat message to the sender's current room.
    Message { from: ParticipantId, text: String },
}
