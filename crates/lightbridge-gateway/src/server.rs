//! HTTP and WebSocket routes.

use crate::hub::DeviceHub;
use axum::Json;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use futures_util::{SinkExt, StreamExt};
use lightbridge_core::{Message, Router as DirectiveRouter};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub router: DirectiveRouter,
    pub hub: Arc<DeviceHub>,
}

pub fn routes(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route("/directive", post(directive))
        .route("/devices/{endpoint_id}", get(device_socket))
        .with_state(state)
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, routes(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Protocol errors are ordinary responses, so this always answers 200.
async fn directive(State(state): State<AppState>, Json(raw): Json<Value>) -> Json<Message> {
    Json(state.router.handle(&raw).await)
}

async fn device_socket(
    ws: WebSocketUpgrade,
    Path(endpoint_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_commands(socket, endpoint_id, state.hub))
}

async fn forward_commands(socket: WebSocket, endpoint_id: String, hub: Arc<DeviceHub>) {
    let (mut sink, mut stream) = socket.split();
    let (generation, mut commands) = hub.subscribe(&endpoint_id).await;
    tracing::info!("{} subscribed, {} bulbs connected", endpoint_id, hub.connected().await);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Could not encode command for {}: {}", endpoint_id, e);
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }

            // Bulbs only listen; anything but a close is ignored.
            msg = stream.next() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.unsubscribe(&endpoint_id, generation).await;
    tracing::info!("{} disconnected", endpoint_id);
}
