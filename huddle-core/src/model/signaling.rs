use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Opaque signaling payload relayed between two participants. The server
/// never inspects the contents beyond routing.
///
/// Serializes as `{"sdp": {...}}` or `{"candidate": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignalPayload {
    #[serde(rename = "sdp")]
    Sdp(SessionDescription),
    #[serde(rename = "candidate")]
    Candidate(IceCandidate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: String) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp,
        }
    }

    pub fn answer(sdp: String) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}
