use crate::config::MeshConfig;
use crate::link::{LinkCommand, LinkEvent, LinkHandle, LinkState, OpenLink, PeerLink};
use crate::publisher::{TrackKind, TrackPublisher};
use huddle_core::{
    ChatMessage, ClientEvent, ParticipantId, RoomId, RosterEntry, SdpKind, ServerEvent,
    SignalPayload,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// User-level operations on the local participant's session.
pub enum SessionCommand {
    JoinRoom {
        room: RoomId,
        display_name: String,
    },
    LeaveRoom,
    Publish {
        kind: TrackKind,
        track: Arc<dyn TrackLocal + Send + Sync>,
    },
    Unpublish {
        kind: TrackKind,
    },
}

/// What the application observes.
pub enum SessionEvent {
    /// Server welcome processed; the session knows its own id.
    Ready { id: ParticipantId },
    Roster(Vec<RosterEntry>),
    LinkState {
        peer: ParticipantId,
        state: LinkState,
    },
    RemoteTrack {
        peer: ParticipantId,
        track: Arc<TrackRemote>,
    },
    /// The link to this peer failed twice; no further retries.
    PeerDegraded { peer: ParticipantId },
    History(Vec<ChatMessage>),
    Chat(ChatMessage),
}

#[derive(Clone)]
pub struct MeshSessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl MeshSessionHandle {
    pub async fn join_room(&self, room: impl Into<RoomId>, display_name: impl Into<String>) {
        let _ = self
            .commands
            .send(SessionCommand::JoinRoom {
                room: room.into(),
                display_name: display_name.into(),
            })
            .await;
    }

    pub async fn leave_room(&self) {
        let _ = self.commands.send(SessionCommand::LeaveRoom).await;
    }

    pub async fn publish(&self, kind: TrackKind, track: Arc<dyn TrackLocal + Send + Sync>) {
        let _ = self
            .commands
            .send(SessionCommand::Publish { kind, track })
            .await;
    }

    pub async fn unpublish(&self, kind: TrackKind) {
        let _ = self.commands.send(SessionCommand::Unpublish { kind }).await;
    }
}

struct LinkEntry {
    id: u64,
    handle: LinkHandle,
    state: LinkState,
    initiator: bool,
    retried: bool,
}

/// One instance per local participant: owns every peer link and drives the
/// mesh toward the roster.
///
/// The session is the sole creator and destroyer of links, which is what
/// keeps the one-link-per-pair invariant. Initiator selection is positional:
/// whoever was already in the room offers toward the newcomer, so the two
/// sides never offer simultaneously.
pub struct MeshSession {
    config: MeshConfig,
    local_id: Option<ParticipantId>,
    room: Option<RoomId>,
    roster: Vec<RosterEntry>,
    /// Set between sending `join-room` and the first snapshot for it. The
    /// members of that snapshot are incumbents: they offer, we answer.
    awaiting_first_roster: bool,
    links: HashMap<ParticipantId, LinkEntry>,
    next_link_id: u64,
    tracks: TrackPublisher,
    command_rx: mpsc::Receiver<SessionCommand>,
    incoming: mpsc::Receiver<ServerEvent>,
    link_events_tx: mpsc::Sender<(ParticipantId, u64, LinkEvent)>,
    link_events_rx: mpsc::Receiver<(ParticipantId, u64, LinkEvent)>,
    outgoing: mpsc::Sender<ClientEvent>,
    app_events: mpsc::Sender<SessionEvent>,
}

impl MeshSession {
    pub fn new(
        config: MeshConfig,
        incoming: mpsc::Receiver<ServerEvent>,
        outgoing: mpsc::Sender<ClientEvent>,
        app_events: mpsc::Sender<SessionEvent>,
    ) -> (MeshSessionHandle, Self) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (link_events_tx, link_events_rx) = mpsc::channel(256);

        let session = Self {
            config,
            local_id: None,
            room: None,
            roster: Vec::new(),
            awaiting_first_roster: false,
            links: HashMap::new(),
            next_link_id: 0,
            tracks: TrackPublisher::new(),
            command_rx,
            incoming,
            link_events_tx,
            link_events_rx,
            outgoing,
            app_events,
        };

        (
            MeshSessionHandle {
                commands: command_tx,
            },
            session,
        )
    }

    pub async fn run(mut self) {
        info!("Mesh session started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                evt = self.incoming.recv() => match evt {
                    Some(evt) => self.handle_server_event(evt).await,
                    None => {
                        info!("Signaling channel closed");
                        break;
                    }
                },

                Some((peer, link_id, evt)) = self.link_events_rx.recv() => {
                    self.handle_link_event(peer, link_id, evt).await;
                }
            }
        }

        self.close_all_links().await;
        info!("Mesh session finished");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::JoinRoom { room, display_name } => {
                // Switching rooms: every link must be fully released and the
                // leave sent before the join goes out.
                if let Some(old) = self.room.take() {
                    self.close_all_links().await;
                    self.send(ClientEvent::LeaveRoom { room: old }).await;
                }

                self.room = Some(room.clone());
                self.roster.clear();
                self.awaiting_first_roster = true;
                self.send(ClientEvent::JoinRoom { room, display_name }).await;
            }

            SessionCommand::LeaveRoom => {
                self.close_all_links().await;
                self.roster.clear();
                if let Some(room) = self.room.take() {
                    self.send(ClientEvent::LeaveRoom { room }).await;
                }
            }

            SessionCommand::Publish { kind, track } => {
                self.tracks.publish(kind, track.clone());
                for entry in self.links.values() {
                    entry
                        .handle
                        .send(LinkCommand::Attach {
                            kind,
                            track: track.clone(),
                        })
                        .await;
                }
            }

            SessionCommand::Unpublish { kind } => {
                self.tracks.unpublish(kind);
                for entry in self.links.values() {
                    entry.handle.send(LinkCommand::Detach { kind }).await;
                }
            }
        }
    }

    async fn handle_server_event(&mut self, evt: ServerEvent) {
        match evt {
            ServerEvent::Welcome { id, ice_servers } => {
                self.local_id = Some(id);
                if !ice_servers.is_empty() {
                    self.config.ice_servers = ice_servers;
                }
                self.emit(SessionEvent::Ready { id }).await;
            }

            ServerEvent::RoomUsers { users } => {
                self.roster = users.clone();
                if self.awaiting_first_roster {
                    // Incumbents initiate toward us; nothing to create here.
                    self.awaiting_first_roster = false;
                } else {
                    self.sweep_stale_links().await;
                }
                self.emit(SessionEvent::Roster(users)).await;
            }

            ServerEvent::UserJoined { id, .. } => {
                if self.local_id == Some(id) {
                    return;
                }
                // A fast rejoin must get a fresh link, never the old one.
                if let Some(entry) = self.links.remove(&id) {
                    entry.handle.send(LinkCommand::Close).await;
                }
                self.open_link(id, true, false).await;
            }

            ServerEvent::UserLeft { id, .. } => {
                if let Some(entry) = self.links.remove(&id) {
                    entry.handle.send(LinkCommand::Close).await;
                }
            }

            ServerEvent::Signal { from, signal } => self.handle_signal(from, signal).await,

            ServerEvent::InitMessages { history } => {
                self.emit(SessionEvent::History(history)).await;
            }

            ServerEvent::NewMessage { message } => {
                self.emit(SessionEvent::Chat(message)).await;
            }
        }
    }

    async fn handle_signal(&mut self, from: ParticipantId, signal: SignalPayload) {
        if let Some(entry) = self.links.get(&from) {
            let cmd = match signal {
                SignalPayload::Sdp(desc) => LinkCommand::RemoteSdp(desc),
                SignalPayload::Candidate(candidate) => LinkCommand::RemoteCandidate(candidate),
            };
            entry.handle.send(cmd).await;
            return;
        }

        // First contact: an incumbent's offer creates the responding link,
        // but only for senders the roster vouches for. A late offer from a
        // previously-left room must not open a cross-room link.
        match signal {
            SignalPayload::Sdp(desc) if desc.kind == SdpKind::Offer => {
                if !self.roster.iter().any(|u| u.id == from) {
                    debug!(%from, "Dropping offer from outside the roster");
                    return;
                }
                self.open_link(from, false, false).await;
                if let Some(entry) = self.links.get(&from) {
                    entry.handle.send(LinkCommand::RemoteSdp(desc)).await;
                }
            }
            _ => {
                // Candidate or answer for a link that just closed.
                debug!(%from, "Dropping signal for unknown link");
            }
        }
    }

    async fn handle_link_event(&mut self, peer: ParticipantId, link_id: u64, evt: LinkEvent) {
        // A late event from an earlier incarnation of this link must not
        // touch its replacement.
        let current = self.links.get(&peer).map(|entry| entry.id);
        if current.is_some_and(|id| id != link_id) {
            debug!(%peer, link_id, "Ignoring event from superseded link");
            return;
        }

        match evt {
            LinkEvent::StateChanged(state) => {
                if state == LinkState::Closed {
                    self.links.remove(&peer);
                } else if let Some(entry) = self.links.get_mut(&peer) {
                    entry.state = state;
                }
                self.emit(SessionEvent::LinkState { peer, state }).await;
            }

            LinkEvent::RemoteTrack(track) => {
                self.emit(SessionEvent::RemoteTrack { peer, track }).await;
            }

            LinkEvent::Failed => {
                let Some(entry) = self.links.remove(&peer) else {
                    return;
                };
                self.emit(SessionEvent::LinkState {
                    peer,
                    state: LinkState::Closed,
                })
                .await;

                let still_present = self.roster.iter().any(|u| u.id == peer);
                if !still_present {
                    return;
                }
                if entry.retried {
                    // Second failure: stop retrying, surface it.
                    self.emit(SessionEvent::PeerDegraded { peer }).await;
                    return;
                }
                info!(%peer, "Retrying failed link");
                self.open_link(peer, entry.initiator, true).await;
            }
        }
    }

    async fn open_link(&mut self, peer: ParticipantId, initiator: bool, retried: bool) {
        let link_id = self.next_link_id;
        self.next_link_id += 1;

        let open = OpenLink {
            remote_id: peer,
            link_id,
            initiator,
            config: self.config.clone(),
            initial_tracks: self.tracks.snapshot(),
            outgoing: self.outgoing.clone(),
            events: self.link_events_tx.clone(),
        };

        match PeerLink::open(open).await {
            Ok(handle) => {
                if initiator {
                    handle.send(LinkCommand::Kickoff).await;
                }
                self.links.insert(peer, LinkEntry {
                    id: link_id,
                    handle,
                    state: LinkState::Connecting,
                    initiator,
                    retried,
                });
                self.emit(SessionEvent::LinkState {
                    peer,
                    state: LinkState::Connecting,
                })
                .await;
            }
            Err(e) => {
                warn!(%peer, "Failed to open link: {e}");
                self.emit(SessionEvent::PeerDegraded { peer }).await;
            }
        }
    }

    /// Close links to peers no longer present in the roster. Covers departures
    /// whose `user-left` we never saw.
    async fn sweep_stale_links(&mut self) {
        let stale: Vec<ParticipantId> = self
            .links
            .keys()
            .filter(|peer| !self.roster.iter().any(|u| u.id == **peer))
            .copied()
            .collect();

        for peer in stale {
            debug!(%peer, "Closing stale link after roster update");
            if let Some(entry) = self.links.remove(&peer) {
                entry.handle.send(LinkCommand::Close).await;
            }
        }
    }

    async fn close_all_links(&mut self) {
        // Each link confirms with its own `Closed` state event.
        for (_, entry) in std::mem::take(&mut self.links) {
            entry.handle.send(LinkCommand::Close).await;
        }
    }

    async fn send(&self, event: ClientEvent) {
        let _ = self.outgoing.send(event).await;
    }

    async fn emit(&self, event: SessionEvent) {
        let _ = self.app_events.send(event).await;
    }
}
