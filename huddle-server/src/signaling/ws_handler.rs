use crate::registry::RegistryCommand;
use crate::signaling::SignalingService;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientEvent, ParticipantId, ServerEvent};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    // Session ids are server-assigned, one per socket lifetime.
    let id = ParticipantId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, id, service))
}

async fn handle_socket(socket: WebSocket, id: ParticipantId, service: SignalingService) {
    info!(%id, "New signaling connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.register(id, tx);
    service.send_event(
        id,
        &ServerEvent::Welcome {
            id,
            ice_servers: service.ice_servers(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            let cmd = into_command(id, event);
                            if let Err(e) = service.commands.send(cmd).await {
                                error!("Coordinator gone: {e}");
                                break;
                            }
                        }
                        Err(e) => warn!(%id, "Invalid client event: {e}"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Either half failing means the socket is gone: implicit leave. Runs
    // even when the receive task was aborted mid-read; the coordinator
    // treats a repeated disconnect as a no-op.
    let _ = service
        .commands
        .send(RegistryCommand::Disconnect { id })
        .await;

    service.deregister(&id);
    info!(%id, "Signaling connection closed");
}

fn into_command(id: ParticipantId, event: ClientEvent) -> RegistryCommand {
    match event {
        ClientEvent::JoinRoom { room, display_name } => RegistryCommand::Join {
            id,
            room,
            display_name,
        },
        ClientEvent::LeaveRoom { .. } => RegistryCommand::Leave { id },
        ClientEvent::Signal { to, signal } => RegistryCommand::Relay {
            from: id,
            to,
            signal,
        },
        ClientEvent::SendMessage { text } => RegistryCommand::Message { from: id, text },
    }
}
