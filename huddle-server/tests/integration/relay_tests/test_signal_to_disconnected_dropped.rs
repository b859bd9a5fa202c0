use axum::extract::ws::Message;
use huddle_core::{IceCandidate, ParticipantId, ServerEvent, SignalPayload};
use huddle_server::{RegistryCommand, SignalingService};
use tokio::sync::mpsc;

use crate::integration::{init_tracing, join, spawn_coordinator};

fn candidate() -> SignalPayload {
    SignalPayload::Candidate(IceCandidate {
        candidate: "candidate:0 1 UDP 1 127.0.0.1 5000 typ host".into(),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
    })
}

#[tokio::test]
async fn test_relay_to_unknown_session_keeps_coordinator_alive() {
    init_tracing();

    let (cmd_tx, sink, _chat) = spawn_coordinator();
    let alice = ParticipantId::new();

    join(&cmd_tx, alice, "general", "alice").await;

    cmd_tx
        .send(RegistryCommand::Relay {
            from: alice,
            to: ParticipantId::new(),
            signal: candidate(),
        })
        .await
        .unwrap();

    // The coordinator keeps serving after the drop.
    let bob = ParticipantId::new();
    join(&cmd_tx, bob, "general", "bob").await;
    sink.wait_for(9, 1000).await;
}

#[tokio::test]
async fn test_ws_delivery_drops_for_deregistered_session() {
    init_tracing();

    let (cmd_tx, _cmd_rx) = mpsc::channel(8);
    let service = SignalingService::new(cmd_tx, vec![]);

    let connected = ParticipantId::new();
    let gone = ParticipantId::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    service.register(connected, tx);

    let event = ServerEvent::Signal {
        from: ParticipantId::new(),
        signal: candidate(),
    };

    // Unknown destination: silently dropped, no frame anywhere.
    service.send_event(gone, &event);
    assert!(rx.try_recv().is_err());

    // Known destination: one JSON text frame that parses back.
    service.send_event(connected, &event);
    match rx.try_recv().expect("frame queued") {
        Message::Text(text) => {
            let parsed: ServerEvent = serde_json::from_str(&text).unwrap();
            assert!(matches!(parsed, ServerEvent::Signal { .. }));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}
