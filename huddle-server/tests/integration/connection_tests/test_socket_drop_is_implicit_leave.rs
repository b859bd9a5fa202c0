use axum::{Router, routing::get};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use huddle_core::{ClientEvent, RoomId, ServerEvent};
use huddle_server::{Coordinator, MemoryChatStore, SignalingService, ws_handler};

use crate::integration::init_tracing;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let service = SignalingService::new(cmd_tx, vec![]);

    let coordinator = Coordinator::new(
        cmd_rx,
        Arc::new(service.clone()),
        Arc::new(MemoryChatStore::default()),
    );
    tokio::spawn(coordinator.run());

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn connect_and_join(addr: SocketAddr, room: &str, name: &str) -> Socket {
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");

    let join = serde_json::to_string(&ClientEvent::JoinRoom {
        room: RoomId::from(room),
        display_name: name.to_owned(),
    })
    .expect("serialize join");
    socket.send(Message::text(join)).await.expect("send join");
    socket
}

async fn next_event(socket: &mut Socket) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().expect("text frame")).expect("server event");
        }
    }
}

#[tokio::test]
async fn test_socket_drop_is_implicit_leave() {
    init_tracing();

    let addr = start_server().await;

    let alice = connect_and_join(addr, "general", "alice").await;
    let mut bob = connect_and_join(addr, "general", "bob").await;

    // Bob is fully joined once his history frame arrives.
    loop {
        if matches!(next_event(&mut bob).await, ServerEvent::InitMessages { .. }) {
            break;
        }
    }

    // No close frame, no leave event: the TCP teardown alone must evict the
    // participant from the registry.
    drop(alice);

    // The shrunken roster precedes the departure notice.
    let mut last_roster = None;
    loop {
        match next_event(&mut bob).await {
            ServerEvent::RoomUsers { users } => last_roster = Some(users),
            ServerEvent::UserLeft { display_name, .. } => {
                assert_eq!(display_name, "alice");
                break;
            }
            _ => {}
        }
    }
    let users = last_roster.expect("roster broadcast before user-left");
    assert!(users.iter().all(|u| u.display_name != "alice"));
}
