pub mod model;

pub use model::{
    ChatMessage, ClientEvent, IceCandidate, IceServerConfig, ParticipantId, RoomId, RosterEntry,
    SdpKind, ServerEvent, SessionDescription, SignalPayload,
};
