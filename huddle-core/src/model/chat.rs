use serde::{Deserialize, Serialize};

/// One chat message as relayed to room members and handed to the history
/// collaborator. Timestamps are unix milliseconds, assigned server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
    pub ts: u64,
}
