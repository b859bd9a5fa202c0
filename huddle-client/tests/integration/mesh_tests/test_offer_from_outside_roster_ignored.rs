use std::time::Duration;
use tokio::sync::mpsc;

use huddle_client::{MeshConfig, MeshSession, SessionEvent};
use huddle_core::{
    ParticipantId, RosterEntry, ServerEvent, SessionDescription, SignalPayload,
};

use crate::integration::init_tracing;

#[tokio::test]
async fn test_offer_from_outside_roster_ignored() {
    init_tracing();

    let (in_tx, in_rx) = mpsc::channel(64);
    let (out_tx, _out_rx) = mpsc::channel(64);
    let (app_tx, mut app_rx) = mpsc::channel(64);

    let config = MeshConfig {
        ice_servers: vec![],
        connect_timeout: Duration::from_secs(5),
    };
    let (handle, session) = MeshSession::new(config, in_rx, out_tx, app_tx);
    tokio::spawn(session.run());

    let me = ParticipantId::new();
    in_tx
        .send(ServerEvent::Welcome {
            id: me,
            ice_servers: vec![],
        })
        .await
        .unwrap();
    handle.join_room("mesh", "alice").await;
    in_tx
        .send(ServerEvent::RoomUsers {
            users: vec![RosterEntry {
                id: me,
                display_name: "alice".into(),
            }],
        })
        .await
        .unwrap();

    // A stray offer from a session the roster never listed. It must not
    // produce a link, however well-formed it looks.
    let rogue = ParticipantId::new();
    in_tx
        .send(ServerEvent::Signal {
            from: rogue,
            signal: SignalPayload::Sdp(SessionDescription::offer("v=0".into())),
        })
        .await
        .unwrap();

    let mut saw_roster = false;
    let deadline = tokio::time::sleep(Duration::from_millis(500));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            evt = app_rx.recv() => match evt.expect("session ended") {
                SessionEvent::LinkState { peer, .. } => {
                    panic!("link created for {peer}, who is outside the roster");
                }
                SessionEvent::PeerDegraded { peer } => {
                    panic!("degradation reported for {peer}, who is outside the roster");
                }
                SessionEvent::Roster(users) => {
                    assert_eq!(users.len(), 1);
                    saw_roster = true;
                }
                _ => {}
            },
            _ = &mut deadline => break,
        }
    }
    assert!(saw_roster, "the legitimate roster still goes through");
}
