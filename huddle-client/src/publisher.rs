use std::collections::HashMap;
use std::sync::Arc;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

/// The media kinds a participant can publish. One sender slot per kind on
/// every link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Microphone,
    Screen,
}

impl TrackKind {
    pub fn codec_type(self) -> RTPCodecType {
        match self {
            TrackKind::Microphone => RTPCodecType::Audio,
            TrackKind::Screen => RTPCodecType::Video,
        }
    }
}

/// Registry of the local participant's active tracks.
///
/// Acquisition (devices, capture) happens before a track reaches this point,
/// so a failed acquisition aborts without touching link or registry state.
/// Links created after a publish pick up the full snapshot at creation time.
#[derive(Clone, Default)]
pub struct TrackPublisher {
    active: HashMap<TrackKind, Arc<dyn TrackLocal + Send + Sync>>,
}

impl TrackPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `track` as the active source for `kind`, returning the one it
    /// replaces (if any).
    pub fn publish(
        &mut self,
        kind: TrackKind,
        track: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        self.active.insert(kind, track)
    }

    pub fn unpublish(&mut self, kind: TrackKind) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        self.active.remove(&kind)
    }

    pub fn get(&self, kind: TrackKind) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        self.active.get(&kind).cloned()
    }

    /// All currently active tracks, for attaching to a newly created link.
    pub fn snapshot(&self) -> Vec<(TrackKind, Arc<dyn TrackLocal + Send + Sync>)> {
        self.active
            .iter()
            .map(|(kind, track)| (*kind, track.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
