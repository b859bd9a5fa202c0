use huddle_core::IceServerConfig;
use std::time::Duration;

/// Client-side mesh configuration.
#[derive(Clone)]
pub struct MeshConfig {
    /// ICE servers handed to every peer connection. Replaced by the set the
    /// server advertises in its welcome, when non-empty.
    pub ice_servers: Vec<IceServerConfig>,
    /// How long a link may sit in `Connecting` before it is torn down.
    pub connect_timeout: Duration,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
            connect_timeout: Duration::from_secs(15),
        }
    }
}
