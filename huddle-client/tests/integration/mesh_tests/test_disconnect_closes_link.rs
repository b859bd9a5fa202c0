use huddle_client::LinkState;

use crate::integration::init_tracing;
use crate::utils::TestNet;

#[tokio::test]
async fn test_disconnect_closes_link() {
    init_tracing();

    let net = TestNet::start();

    let mut alice = net.connect().await;
    alice.handle.join_room("mesh", "alice").await;
    alice
        .wait_roster_len(1, 5000)
        .await
        .expect("alice never saw her own roster");

    let mut bob = net.connect().await;
    bob.handle.join_room("mesh", "bob").await;

    alice
        .wait_link_state(bob.id, LinkState::Connected, 15_000)
        .await
        .expect("link never connected");
    bob.wait_link_state(alice.id, LinkState::Connected, 15_000)
        .await
        .expect("link never connected on bob's side");

    // Transport loss, no leave: the departure event must still clean up.
    net.disconnect(bob.id).await;

    // The shrunken roster is delivered first, then the link confirms closing.
    alice
        .wait_roster_len(1, 5000)
        .await
        .expect("alice never got the shrunken roster");
    alice
        .wait_link_state(bob.id, LinkState::Closed, 5000)
        .await
        .expect("alice never saw the link close");
}
