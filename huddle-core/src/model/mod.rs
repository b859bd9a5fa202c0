mod chat;
mod event;
mod participant;
mod room;
mod signaling;

pub use chat::ChatMessage;
pub use event::{ClientEvent, RosterEntry, ServerEvent};
pub use participant::ParticipantId;
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, SdpKind, SessionDescription, SignalPayload};
