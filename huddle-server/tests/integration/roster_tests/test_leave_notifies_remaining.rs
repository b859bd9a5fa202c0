use huddle_core::{ParticipantId, ServerEvent};
use huddle_server::RegistryCommand;

use crate::integration::{init_tracing, join, spawn_coordinator};

#[tokio::test]
async fn test_leave_notifies_remaining() {
    init_tracing();

    let (cmd_tx, sink, _chat) = spawn_coordinator();
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    join(&cmd_tx, alice, "general", "alice").await;
    join(&cmd_tx, bob, "general", "bob").await;

    cmd_tx
        .send(RegistryCommand::Leave { id: bob })
        .await
        .unwrap();

    // 8 join events + roster and departure notice for the remaining member.
    sink.wait_for(10, 1000).await;

    let alice_events = sink.events_for(&alice).await;
    assert!(alice_events.iter().any(|e| matches!(
        e,
        ServerEvent::UserLeft { id, .. } if *id == bob
    )));

    let last_roster = sink.rosters_for(&alice).await.pop().unwrap();
    assert_eq!(last_roster.iter().map(|u| u.id).collect::<Vec<_>>(), vec![
        alice
    ]);

    // The leaver gets nothing further.
    let bob_events = sink.events_for(&bob).await;
    assert!(!bob_events
        .iter()
        .any(|e| matches!(e, ServerEvent::UserLeft { .. })));
}
