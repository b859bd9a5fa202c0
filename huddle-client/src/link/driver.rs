use crate::error::LinkError;
use huddle_core::{IceCandidate, IceServerConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_remote::TrackRemote;

/// Raw transport notifications surfaced from the webrtc callbacks into the
/// link's event loop, so all negotiation logic runs on one queue instead of
/// inside nested callbacks.
pub enum DriverEvent {
    StateChanged(RTCPeerConnectionState),
    LocalCandidate(IceCandidate),
    RemoteTrack(Arc<TrackRemote>),
    /// The remote-created control channel is open and writable.
    ControlReady(Arc<RTCDataChannel>),
    /// A text frame arrived on the control channel.
    ControlMessage(String),
}

/// Build a peer connection whose callbacks feed `event_tx`.
pub(crate) async fn build_peer_connection(
    ice_servers: &[IceServerConfig],
    event_tx: mpsc::Sender<DriverEvent>,
) -> Result<Arc<RTCPeerConnection>, LinkError> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;

    let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let rtc_config = RTCConfiguration {
        ice_servers: ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
            })
            .collect(),
        ..Default::default()
    };

    let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

    let state_tx = event_tx.clone();
    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        let tx = state_tx.clone();
        Box::pin(async move {
            let _ = tx.send(DriverEvent::StateChanged(state)).await;
        })
    }));

    // Trickle ICE: every locally gathered candidate goes out through the
    // relay. `None` marks end of gathering and carries no payload.
    let ice_tx = event_tx.clone();
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let tx = ice_tx.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else { return };
            let Ok(init) = candidate.to_json() else {
                debug!("Skipping unserializable local candidate");
                return;
            };
            let _ = tx
                .send(DriverEvent::LocalCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }))
                .await;
        })
    }));

    let track_tx = event_tx.clone();
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let tx = track_tx.clone();
        Box::pin(async move {
            let _ = tx.send(DriverEvent::RemoteTrack(track)).await;
        })
    }));

    // The responding side receives the initiator's control channel here. It
    // becomes usable at on_open, not at announcement.
    let dc_tx = event_tx;
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let tx = dc_tx.clone();
        Box::pin(async move {
            debug!("Data channel '{}' announced by remote", dc.label());
            let open_dc = dc.clone();
            let open_tx = tx.clone();
            dc.on_open(Box::new(move || {
                Box::pin(async move {
                    let _ = open_tx.send(DriverEvent::ControlReady(open_dc)).await;
                })
            }));
        })
    }));

    Ok(pc)
}

/// Forward every text frame on `dc` into the link's event queue.
pub(crate) fn wire_control_messages(dc: &Arc<RTCDataChannel>, event_tx: mpsc::Sender<DriverEvent>) {
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = event_tx.clone();
        Box::pin(async move {
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => {
                    let _ = tx.send(DriverEvent::ControlMessage(text)).await;
                }
                Err(_) => debug!("Ignoring non-text control frame"),
            }
        })
    }));
}

pub(crate) fn candidate_init(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_m_line_index,
        username_fragment: None,
    }
}
