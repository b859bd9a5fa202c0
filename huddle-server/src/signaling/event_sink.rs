use async_trait::async_trait;
use huddle_core::{ParticipantId, ServerEvent};

/// Outbound side of the coordinator: delivery of events to connected
/// sessions. Implemented by the WebSocket layer in production and by
/// capturing mocks in tests. Delivering to a session that is no longer
/// connected is a logged no-op, never an error surfaced to the caller.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, to: ParticipantId, event: ServerEvent);
}
