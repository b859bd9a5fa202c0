use crate::config::MeshConfig;
use crate::error::LinkError;
use crate::link::driver::{DriverEvent, build_peer_connection, candidate_init, wire_control_messages};
use crate::publisher::TrackKind;
use huddle_core::{
    ClientEvent, IceCandidate, ParticipantId, SdpKind, SessionDescription, SignalPayload,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Lifecycle of one direct media path. `Absent` is implicit: no entry in the
/// session's link map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    Closed,
}

/// Commands delivered to one link's queue. Strictly ordered within a link;
/// links never block each other.
pub enum LinkCommand {
    /// Initiator side only: produce and send the first offer.
    Kickoff,
    RemoteSdp(SessionDescription),
    RemoteCandidate(IceCandidate),
    Attach {
        kind: TrackKind,
        track: Arc<dyn TrackLocal + Send + Sync>,
    },
    Detach {
        kind: TrackKind,
    },
    Close,
}

/// Notifications a link reports back to its session.
pub enum LinkEvent {
    StateChanged(LinkState),
    RemoteTrack(Arc<TrackRemote>),
    /// Unrecoverable failure or connect timeout; the link is gone. Retry
    /// policy lives in the session.
    Failed,
}

#[derive(Clone)]
pub struct LinkHandle {
    commands: mpsc::Sender<LinkCommand>,
}

impl LinkHandle {
    pub async fn send(&self, cmd: LinkCommand) {
        // A closed link has already reported its terminal event.
        let _ = self.commands.send(cmd).await;
    }
}

/// Everything needed to open a link to one remote participant.
pub struct OpenLink {
    pub remote_id: ParticipantId,
    /// Distinguishes this link from earlier incarnations toward the same
    /// remote, so a late event from a closed link cannot touch a fresh one.
    pub link_id: u64,
    /// True when the local side was already in the room when the remote
    /// appeared. The initiator creates the control channel and first offer.
    pub initiator: bool,
    pub config: MeshConfig,
    /// Tracks active at creation time; attached before the first exchange.
    pub initial_tracks: Vec<(TrackKind, Arc<dyn TrackLocal + Send + Sync>)>,
    pub outgoing: mpsc::Sender<ClientEvent>,
    pub events: mpsc::Sender<(ParticipantId, u64, LinkEvent)>,
}

/// Per-remote negotiation state machine.
///
/// All webrtc callbacks are folded into `DriverEvent`s on the same queue as
/// the session's commands, so suspension happens only at description and
/// offer/answer boundaries.
///
/// Offers flow in one direction only: the initiator produces every offer,
/// initial and renegotiation alike, and the responder always answers. When
/// the responder needs a new m-line it sends a `renegotiate audio|video`
/// request over the control channel instead of offering, so two offers can
/// never cross on the wire.
pub struct PeerLink {
    remote_id: ParticipantId,
    link_id: u64,
    initiator: bool,
    pc: Arc<RTCPeerConnection>,
    state: LinkState,
    /// Initiator only: an offer is in flight and the matching answer has not
    /// arrived yet.
    offer_outstanding: bool,
    /// Remote description has been applied at least once.
    remote_set: bool,
    /// Initiator only: a re-offer is due as soon as the link is connected and
    /// no offer is in flight.
    pending_renegotiate: bool,
    /// Responder only: media kinds to request from the initiator once the
    /// control channel is writable.
    pending_requests: Vec<RTPCodecType>,
    /// The `control` channel: created locally on the initiator, received via
    /// `on_data_channel` on the responder.
    control: Option<Arc<RTCDataChannel>>,
    pending_candidates: Vec<IceCandidate>,
    senders: HashMap<TrackKind, Arc<RTCRtpSender>>,
    connect_timeout: Duration,
    command_rx: mpsc::Receiver<LinkCommand>,
    driver_rx: mpsc::Receiver<DriverEvent>,
    outgoing: mpsc::Sender<ClientEvent>,
    events: mpsc::Sender<(ParticipantId, u64, LinkEvent)>,
}

impl PeerLink {
    /// Create the peer connection, attach the current tracks, and spawn the
    /// link's event loop.
    pub async fn open(args: OpenLink) -> Result<LinkHandle, LinkError> {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (driver_tx, driver_rx) = mpsc::channel(64);

        let pc = build_peer_connection(&args.config.ice_servers, driver_tx.clone()).await?;

        // The control channel guarantees at least one negotiated section, so
        // a link reaches `Connected` even before anyone publishes media. It
        // also carries the responder's renegotiation requests.
        let mut control = None;
        if args.initiator {
            let dc = pc.create_data_channel("control", None).await?;
            wire_control_messages(&dc, driver_tx);
            control = Some(dc);
        }

        let mut link = Self {
            remote_id: args.remote_id,
            link_id: args.link_id,
            initiator: args.initiator,
            pc,
            state: LinkState::Connecting,
            offer_outstanding: false,
            remote_set: false,
            pending_renegotiate: false,
            pending_requests: Vec::new(),
            control,
            pending_candidates: Vec::new(),
            senders: HashMap::new(),
            connect_timeout: args.config.connect_timeout,
            command_rx,
            driver_rx,
            outgoing: args.outgoing,
            events: args.events,
        };

        for (kind, track) in args.initial_tracks {
            link.attach(kind, track).await?;
        }

        tokio::spawn(link.run());

        Ok(LinkHandle {
            commands: command_tx,
        })
    }

    async fn run(mut self) {
        debug!(remote = %self.remote_id, "Peer link started");

        let deadline = tokio::time::sleep(self.connect_timeout);
        tokio::pin!(deadline);

        while self.state != LinkState::Closed {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some(evt) = self.driver_rx.recv() => self.handle_driver_event(evt).await,

                _ = &mut deadline, if self.state == LinkState::Connecting => {
                    self.fail(LinkError::Timeout).await;
                }
            }
        }

        // Releases senders, transports, and any in-flight gathering.
        if let Err(e) = self.pc.close().await {
            debug!(remote = %self.remote_id, "Error closing peer connection: {e}");
        }
        debug!(remote = %self.remote_id, "Peer link finished");
    }

    async fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::Kickoff => {
                if let Err(e) = self.send_offer().await {
                    self.fail(e).await;
                }
            }

            LinkCommand::RemoteSdp(desc) => {
                let result = match desc.kind {
                    SdpKind::Offer => self.apply_remote_offer(desc.sdp).await,
                    SdpKind::Answer => self.apply_remote_answer(desc.sdp).await,
                };
                if let Err(e) = result {
                    self.fail(e).await;
                }
            }

            LinkCommand::RemoteCandidate(candidate) => {
                if !self.remote_set {
                    // Applied in arrival order once the description lands.
                    self.pending_candidates.push(candidate);
                    return;
                }
                if let Err(e) = self.pc.add_ice_candidate(candidate_init(candidate)).await {
                    // One bad candidate does not doom the link.
                    warn!(remote = %self.remote_id, "Failed to add ICE candidate: {e}");
                }
            }

            LinkCommand::Attach { kind, track } => {
                if let Err(e) = self.attach(kind, track).await {
                    self.fail(e).await;
                }
            }

            LinkCommand::Detach { kind } => {
                let Some(sender) = self.senders.get(&kind) else {
                    return;
                };
                // The remote observes an ended track, not a closed link.
                if let Err(e) = sender.replace_track(None).await {
                    warn!(remote = %self.remote_id, "Failed to clear {kind:?} sender: {e}");
                }
            }

            LinkCommand::Close => {
                if self.state != LinkState::Closed {
                    self.state = LinkState::Closed;
                    self.emit(LinkEvent::StateChanged(LinkState::Closed)).await;
                }
            }
        }
    }

    async fn handle_driver_event(&mut self, evt: DriverEvent) {
        match evt {
            DriverEvent::StateChanged(state) => {
                debug!(remote = %self.remote_id, "Peer connection state: {state}");
                match state {
                    RTCPeerConnectionState::Connected => {
                        if self.state == LinkState::Connecting {
                            self.state = LinkState::Connected;
                            self.emit(LinkEvent::StateChanged(LinkState::Connected)).await;
                        }
                        if let Err(e) = self.maybe_renegotiate().await {
                            self.fail(e).await;
                        }
                    }
                    RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Disconnected
                    | RTCPeerConnectionState::Closed => {
                        self.fail(LinkError::TransportFailed(state)).await;
                    }
                    _ => {}
                }
            }

            DriverEvent::LocalCandidate(candidate) => {
                self.send_signal(SignalPayload::Candidate(candidate)).await;
            }

            DriverEvent::RemoteTrack(track) => {
                self.emit(LinkEvent::RemoteTrack(track)).await;
            }

            DriverEvent::ControlReady(dc) => {
                self.control = Some(dc);
                self.flush_requests().await;
            }

            DriverEvent::ControlMessage(text) => {
                if let Err(e) = self.handle_control_message(&text).await {
                    self.fail(e).await;
                }
            }
        }
    }

    async fn handle_control_message(&mut self, text: &str) -> Result<(), LinkError> {
        let Some(kind) = requested_kind(text) else {
            debug!(remote = %self.remote_id, "Ignoring control message: {text}");
            return Ok(());
        };
        if !self.initiator {
            debug!(remote = %self.remote_id, "Ignoring renegotiation request on the answering side");
            return Ok(());
        }

        // The re-offer must carry an m-line of the requested kind, or the
        // responder's sender has nothing to pair with.
        let present = self
            .pc
            .get_transceivers()
            .await
            .iter()
            .any(|t| t.kind() == kind);
        if !present {
            self.pc.add_transceiver_from_kind(kind, None).await?;
        }

        self.pending_renegotiate = true;
        self.maybe_renegotiate().await
    }

    async fn send_offer(&mut self) -> Result<(), LinkError> {
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        self.offer_outstanding = true;
        self.send_signal(SignalPayload::Sdp(SessionDescription::offer(offer.sdp)))
            .await;
        Ok(())
    }

    async fn apply_remote_offer(&mut self, sdp: String) -> Result<(), LinkError> {
        if self.initiator {
            // The responder never offers; it requests renegotiation over the
            // control channel. Anything else is a protocol violation.
            warn!(remote = %self.remote_id, "Dropping offer from the answering side");
            return Ok(());
        }

        let desc = RTCSessionDescription::offer(sdp)?;
        self.pc.set_remote_description(desc).await?;
        self.remote_set = true;
        self.flush_candidates().await;

        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        self.send_signal(SignalPayload::Sdp(SessionDescription::answer(answer.sdp)))
            .await;
        Ok(())
    }

    async fn apply_remote_answer(&mut self, sdp: String) -> Result<(), LinkError> {
        if !self.offer_outstanding {
            warn!(remote = %self.remote_id, "Dropping unsolicited answer");
            return Ok(());
        }

        let desc = RTCSessionDescription::answer(sdp)?;
        self.pc.set_remote_description(desc).await?;
        self.remote_set = true;
        self.offer_outstanding = false;
        self.flush_candidates().await;
        self.maybe_renegotiate().await
    }

    /// Attach a local track. An existing sender of the same kind gets the
    /// track substituted in place, preserving the negotiated session; a new
    /// kind adds a sender and renegotiates once the link allows it.
    async fn attach(
        &mut self,
        kind: TrackKind,
        track: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Result<(), LinkError> {
        if let Some(sender) = self.senders.get(&kind) {
            sender.replace_track(Some(track)).await?;
            return Ok(());
        }

        let sender = self.pc.add_track(track).await?;
        self.senders.insert(kind, sender);

        if self.initiator {
            // Tracks added before the first offer ride that offer.
            if self.pc.local_description().await.is_some() {
                self.pending_renegotiate = true;
            }
            return self.maybe_renegotiate().await;
        }

        // The responder cannot offer; it asks the initiator for the m-line
        // and its sender pairs with the next exchange.
        self.pending_requests.push(kind.codec_type());
        self.flush_requests().await;
        Ok(())
    }

    async fn maybe_renegotiate(&mut self) -> Result<(), LinkError> {
        if self.pending_renegotiate
            && self.state == LinkState::Connected
            && !self.offer_outstanding
        {
            self.pending_renegotiate = false;
            self.send_offer().await?;
        }
        Ok(())
    }

    async fn flush_requests(&mut self) {
        let Some(dc) = self.control.clone() else {
            return;
        };
        for kind in std::mem::take(&mut self.pending_requests) {
            if let Err(e) = dc.send_text(format!("renegotiate {kind}")).await {
                warn!(remote = %self.remote_id, "Failed to send renegotiation request: {e}");
            }
        }
    }

    async fn flush_candidates(&mut self) {
        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.pc.add_ice_candidate(candidate_init(candidate)).await {
                warn!(remote = %self.remote_id, "Failed to add buffered ICE candidate: {e}");
            }
        }
    }

    async fn fail(&mut self, err: LinkError) {
        if self.state == LinkState::Closed {
            return;
        }
        warn!(remote = %self.remote_id, "Link failed: {err}");
        self.state = LinkState::Closed;
        self.emit(LinkEvent::Failed).await;
    }

    async fn send_signal(&self, signal: SignalPayload) {
        let _ = self
            .outgoing
            .send(ClientEvent::Signal {
                to: self.remote_id,
                signal,
            })
            .await;
    }

    async fn emit(&self, event: LinkEvent) {
        let _ = self.events.send((self.remote_id, self.link_id, event)).await;
    }
}

fn requested_kind(text: &str) -> Option<RTPCodecType> {
    match text.strip_prefix("renegotiate ")? {
        "audio" => Some(RTPCodecType::Audio),
        "video" => Some(RTPCodecType::Video),
        _ => None,
    }
}
