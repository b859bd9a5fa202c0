pub mod config;
pub mod error;
pub mod link;
pub mod monitor;
pub mod publisher;
pub mod session;

pub use config::MeshConfig;
pub use error::LinkError;
pub use link::{LinkCommand, LinkEvent, LinkHandle, LinkState, OpenLink, PeerLink};
pub use monitor::SpeakingMonitor;
pub use publisher::{TrackKind, TrackPublisher};
pub use session::{MeshSession, MeshSessionHandle, SessionCommand, SessionEvent};
