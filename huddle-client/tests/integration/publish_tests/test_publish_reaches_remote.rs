use huddle_client::{LinkState, TrackKind};
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

use crate::integration::init_tracing;
use crate::utils::{TestNet, pump_samples, sample_audio_track};

#[tokio::test]
async fn test_publish_reaches_remote() {
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

    // Mic first: attached to the established link, delivered via renegotiation.
    let mic = sample_audio_track("mic");
    let mic_pump = pump_samples(mic.clone());
    alice.handle.publish(TrackKind::Microphone, mic).await;

    let track = bob
        .wait_remote_track(alice.id, 15_000)
        .await
        .expect("bob never received the microphone track");
    assert_eq!(track.kind(), RTPCodecType::Audio);

    // A second kind renegotiates again without disturbing the first.
    let screen = sample_audio_track("screen");
    let screen_pump = pump_samples(screen.clone());
    alice.handle.publish(TrackKind::Screen, screen).await;

    bob.wait_remote_track(alice.id, 15_000)
        .await
        .expect("bob never received the screen track");

    mic_pump.abort();
    screen_pump.abort();
}
