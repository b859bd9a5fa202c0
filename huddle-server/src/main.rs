use axum::{Router, routing::get};
use huddle_core::IceServerConfig;
use huddle_server::{Coordinator, MemoryChatStore, SignalingService, ws_handler};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{Level, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Initializing huddle signaling server...");

    let stun_url =
        env::var("STUN_URL").unwrap_or_else(|_| "stun:stun.l.google.com:19302".to_owned());
    let mut ice_servers = vec![IceServerConfig {
        urls: vec![stun_url],
        username: None,
        credential: None,
    }];
    if let Ok(turn_url) = env::var("TURN_URL") {
        ice_servers.push(IceServerConfig {
            urls: vec![turn_url],
            username: env::var("TURN_USERNAME").ok(),
            credential: env::var("TURN_CREDENTIAL").ok(),
        });
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let signaling = SignalingService::new(cmd_tx, ice_servers);

    let coordinator = Coordinator::new(
        cmd_rx,
        Arc::new(signaling.clone()),
        Arc::new(MemoryChatStore::default()),
    );
    tokio::spawn(coordinator.run());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(signaling);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Signaling server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
