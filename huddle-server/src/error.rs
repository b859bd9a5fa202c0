use huddle_core::ParticipantId;
use thiserror::Error;

/// Registry lookups that reference state which no longer (or never) existed.
/// These are expected under join/leave races: the handler logs and drops the
/// event, and no broadcast is issued.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),
}
