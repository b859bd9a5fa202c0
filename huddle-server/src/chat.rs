use async_trait::async_trait;
use huddle_core::{ChatMessage, RoomId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// History collaborator. The coordinator only needs the shared room id; how
/// (or whether) messages survive a restart is the implementation's business.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn history(&self, room: &RoomId) -> Vec<ChatMessage>;

    async fn append(&self, room: &RoomId, message: ChatMessage);
}

/// Process-local store, used by the server binary and tests.
#[derive(Default)]
pub struct MemoryChatStore {
    rooms: RwLock<HashMap<RoomId, Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn history(&self, room: &RoomId) -> Vec<ChatMessage> {
        self.rooms
            .read()
            .await
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    async fn append(&self, room: &RoomId, message: ChatMessage) {
        self.rooms
            .write()
            .await
            .entry(room.clone())
            .or_default()
            .push(message);
    }
}
