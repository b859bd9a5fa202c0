use huddle_core::{ParticipantId, ServerEvent};
use huddle_server::RegistryCommand;

use crate::integration::{init_tracing, join, spawn_coordinator};

#[tokio::test]
async fn test_disconnect_is_implicit_leave() {
    init_tracing();

    let (cmd_tx, sink, _chat) = spawn_coordinator();
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    join(&cmd_tx, alice, "general", "alice").await;
    join(&cmd_tx, bob, "general", "bob").await;

    cmd_tx
        .send(RegistryCommand::Disconnect { id: alice })
        .await
        .unwrap();

    sink.wait_for(10, 1000).await;

    let bob_events = sink.events_for(&bob).await;
    assert!(bob_events.iter().any(|e| matches!(
        e,
        ServerEvent::UserLeft { id, .. } if *id == alice
    )));
    let last_roster = sink.rosters_for(&bob).await.pop().unwrap();
    assert!(last_roster.iter().all(|u| u.id != alice));
}

#[tokio::test]
async fn test_repeated_disconnect_is_idempotent() {
    init_tracing();

    let (cmd_tx, sink, _chat) = spawn_coordinator();
    let alice = ParticipantId::new();

    join(&cmd_tx, alice, "general", "alice").await;
    sink.wait_for(3, 1000).await;

    // Explicit leave, then the socket teardown's disconnect for the same id.
    cmd_tx
        .send(RegistryCommand::Leave { id: alice })
        .await
        .unwrap();
    cmd_tx
        .send(RegistryCommand::Disconnect { id: alice })
        .await
        .unwrap();

    // Prove both were processed by issuing one more observable join.
    let carol = ParticipantId::new();
    join(&cmd_tx, carol, "general", "carol").await;
    sink.wait_for(6, 1000).await;

    // Neither cleanup produced a broadcast: the room was already empty.
    assert_eq!(sink.events().await.len(), 6);
}
