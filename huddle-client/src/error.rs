use thiserror::Error;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Failures while negotiating or maintaining one peer link. A link error
/// never escapes its link: the session tears the link down, retries once,
/// and degrades the peer after a second failure.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("webrtc failure: {0}")]
    Rtc(#[from] webrtc::Error),

    #[error("transport state {0}")]
    TransportFailed(RTCPeerConnectionState),

    #[error("negotiation timed out")]
    Timeout,
}
