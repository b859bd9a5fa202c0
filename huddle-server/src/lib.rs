pub mod chat;
pub mod error;
pub mod registry;
pub mod signaling;

pub use chat::{ChatStore, MemoryChatStore};
pub use error::RegistryError;
pub use registry::{Coordinator, RegistryCommand};
pub use signaling::{EventSink, SignalingService, ws_handler};
