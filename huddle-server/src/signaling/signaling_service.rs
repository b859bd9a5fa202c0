use crate::registry::RegistryCommand;
use crate::signaling::EventSink;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use huddle_core::{IceServerConfig, ParticipantId, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

struct SignalingInner {
    sessions: DashMap<ParticipantId, mpsc::UnboundedSender<Message>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Connected-session table shared between the WebSocket handlers and the
/// coordinator. Cheap to clone; all clones see the same sessions.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
    pub(crate) commands: mpsc::Sender<RegistryCommand>,
}

impl SignalingService {
    pub fn new(commands: mpsc::Sender<RegistryCommand>, ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                sessions: DashMap::new(),
                ice_servers,
            }),
            commands,
        }
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn register(&self, id: ParticipantId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.sessions.insert(id, tx);
    }

    pub fn deregister(&self, id: &ParticipantId) {
        self.inner.sessions.remove(id);
    }

    pub fn send_event(&self, id: ParticipantId, event: &ServerEvent) {
        let Some(session) = self.inner.sessions.get(&id) else {
            // Destination raced us to disconnect; drop, per relay contract.
            debug!(%id, "Dropping event for disconnected session");
            return;
        };

        match serde_json::to_string(event) {
            Ok(json) => {
                if let Err(e) = session.send(Message::Text(json.into())) {
                    error!(%id, "Failed to queue WS message: {e}");
                }
            }
            Err(e) => error!("Failed to serialize server event: {e}"),
        }
    }
}

#[async_trait]
impl EventSink for SignalingService {
    async fn send(&self, to: ParticipantId, event: ServerEvent) {
        self.send_event(to, &event);
    }
}
